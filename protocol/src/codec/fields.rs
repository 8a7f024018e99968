//! # Field Coordinates
//!
//! Every serializable field has a pair of coordinates: the type code of its
//! value and a field id that is unique within that type. Canonical order is
//! the lexicographic order of those pairs, so this table is as much a part
//! of the wire format as the encoders themselves.
//!
//! The table is static and immutable. The two lookup indices (by name and
//! by coordinates) are built the first time they are needed and shared
//! read-only for the lifetime of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use super::error::CodecError;

// ---------------------------------------------------------------------------
// TypeCode
// ---------------------------------------------------------------------------

/// Wire type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeCode {
    UInt16 = 1,
    UInt32 = 2,
    UInt64 = 3,
    Hash128 = 4,
    Hash256 = 5,
    Amount = 6,
    Blob = 7,
    AccountId = 8,
    Object = 14,
    Array = 15,
    UInt8 = 16,
    Hash160 = 17,
    PathSet = 18,
    Vector256 = 19,
}

impl TypeCode {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Some(match id {
            1 => Self::UInt16,
            2 => Self::UInt32,
            3 => Self::UInt64,
            4 => Self::Hash128,
            5 => Self::Hash256,
            6 => Self::Amount,
            7 => Self::Blob,
            8 => Self::AccountId,
            14 => Self::Object,
            15 => Self::Array,
            16 => Self::UInt8,
            17 => Self::Hash160,
            18 => Self::PathSet,
            19 => Self::Vector256,
            _ => return None,
        })
    }

    /// Short human name used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Hash128 => "Hash128",
            Self::Hash256 => "Hash256",
            Self::Amount => "Amount",
            Self::Blob => "Blob",
            Self::AccountId => "AccountID",
            Self::Object => "Object",
            Self::Array => "Array",
            Self::UInt8 => "UInt8",
            Self::Hash160 => "Hash160",
            Self::PathSet => "PathSet",
            Self::Vector256 => "Vector256",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// FieldSpec
// ---------------------------------------------------------------------------

/// One row of the coordinate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub type_code: TypeCode,
    pub field_id: u8,
}

impl FieldSpec {
    /// Canonical sort key.
    pub fn coordinates(&self) -> (u8, u8) {
        (self.type_code.id(), self.field_id)
    }

    /// Fields that are left out of the signing serialization.
    pub fn is_signing_field(&self) -> bool {
        self.name != "TxnSignature"
    }

    /// Encode the field header.
    ///
    /// The first byte packs the type code in the high nibble and the field id
    /// in the low nibble. Either nibble is zero when its id does not fit in
    /// four bits, in which case the full id follows in its own byte (type
    /// first, then field).
    pub fn header(&self) -> Vec<u8> {
        let type_id = self.type_code.id();
        let field_id = self.field_id;
        let mut header = Vec::with_capacity(3);

        let high = if type_id < 16 { type_id << 4 } else { 0 };
        let low = if field_id < 16 { field_id } else { 0 };
        header.push(high | low);

        if type_id >= 16 {
            header.push(type_id);
        }
        if field_id >= 16 {
            header.push(field_id);
        }
        header
    }
}

macro_rules! fields {
    ($($ty:ident { $($name:ident = $id:expr),* $(,)? })*) => {
        &[
            $($(FieldSpec {
                name: stringify!($name),
                type_code: TypeCode::$ty,
                field_id: $id,
            },)*)*
        ]
    };
}

/// The coordinate table.
pub static FIELD_TABLE: &[FieldSpec] = fields! {
    UInt16 {
        LedgerEntryType = 1, TransactionType = 2, SignerWeight = 3,
    }
    UInt32 {
        Flags = 2, SourceTag = 3, Sequence = 4, PreviousTxnLgrSeq = 5,
        LedgerSequence = 6, CloseTime = 7, ParentCloseTime = 8, SigningTime = 9,
        Expiration = 10, TransferRate = 11, WalletSize = 12, OwnerCount = 13,
        DestinationTag = 14, HighQualityIn = 16, HighQualityOut = 17,
        LowQualityIn = 18, LowQualityOut = 19, QualityIn = 20, QualityOut = 21,
        StampEscrow = 22, BondAmount = 23, LoadFee = 24, OfferSequence = 25,
        FirstLedgerSequence = 26, LastLedgerSequence = 27, TransactionIndex = 28,
        OperationLimit = 29, ReferenceFeeUnits = 30, ReserveBase = 31,
        ReserveIncrement = 32, SetFlag = 33, ClearFlag = 34, SignerQuorum = 35,
        CancelAfter = 36, FinishAfter = 37, SignerListID = 38,
    }
    UInt64 {
        IndexNext = 1, IndexPrevious = 2, BookNode = 3, OwnerNode = 4,
        BaseFee = 5, ExchangeRate = 6, LowNode = 7, HighNode = 8,
    }
    Hash128 {
        EmailHash = 1,
    }
    Hash256 {
        LedgerHash = 1, ParentHash = 2, TransactionHash = 3, AccountHash = 4,
        PreviousTxnID = 5, LedgerIndex = 6, WalletLocator = 7, RootIndex = 8,
        AccountTxnID = 9, BookDirectory = 16, InvoiceID = 17, Nickname = 18,
        Amendment = 19, TicketID = 20, Digest = 21,
    }
    Amount {
        Amount = 1, Balance = 2, LimitAmount = 3, TakerPays = 4, TakerGets = 5,
        LowLimit = 6, HighLimit = 7, Fee = 8, SendMax = 9, DeliverMin = 10,
        MinimumOffer = 16, RippleEscrow = 17, DeliveredAmount = 18,
    }
    Blob {
        PublicKey = 1, MessageKey = 2, SigningPubKey = 3, TxnSignature = 4,
        Generator = 5, Signature = 6, Domain = 7, FundCode = 8, RemoveCode = 9,
        ExpireCode = 10, CreateCode = 11, MemoType = 12, MemoData = 13,
        MemoFormat = 14,
    }
    AccountId {
        Account = 1, Owner = 2, Destination = 3, Issuer = 4, Target = 7,
        RegularKey = 8,
    }
    Object {
        TransactionMetaData = 2, CreatedNode = 3, DeletedNode = 4,
        ModifiedNode = 5, PreviousFields = 6, FinalFields = 7, NewFields = 8,
        TemplateEntry = 9, Memo = 10, SignerEntry = 11, Signer = 16,
    }
    Array {
        Signers = 3, SignerEntries = 4, Template = 5, Necessary = 6,
        Sufficient = 7, AffectedNodes = 8, Memos = 9,
    }
    UInt8 {
        CloseResolution = 1, TemplateEntryType = 2, TransactionResult = 3,
    }
    Hash160 {
        TakerPaysCurrency = 1, TakerPaysIssuer = 2, TakerGetsCurrency = 3,
        TakerGetsIssuer = 4,
    }
    PathSet {
        Paths = 1,
    }
    Vector256 {
        Indexes = 1, Hashes = 2, Amendments = 3,
    }
};

fn name_index() -> &'static HashMap<&'static str, &'static FieldSpec> {
    static INDEX: OnceLock<HashMap<&'static str, &'static FieldSpec>> = OnceLock::new();
    INDEX.get_or_init(|| FIELD_TABLE.iter().map(|spec| (spec.name, spec)).collect())
}

fn coordinate_index() -> &'static HashMap<(u8, u8), &'static FieldSpec> {
    static INDEX: OnceLock<HashMap<(u8, u8), &'static FieldSpec>> = OnceLock::new();
    INDEX.get_or_init(|| {
        FIELD_TABLE
            .iter()
            .map(|spec| (spec.coordinates(), spec))
            .collect()
    })
}

/// Resolve a field name.
///
/// # Errors
///
/// [`CodecError::UnknownField`] when the name is not in the table.
pub fn field_by_name(name: &str) -> Result<&'static FieldSpec, CodecError> {
    name_index()
        .get(name)
        .copied()
        .ok_or_else(|| CodecError::UnknownField(name.to_string()))
}

/// Resolve a pair of coordinates read off the wire.
pub fn field_by_coordinates(type_id: u8, field_id: u8) -> Result<&'static FieldSpec, CodecError> {
    coordinate_index()
        .get(&(type_id, field_id))
        .copied()
        .ok_or(CodecError::UnknownFieldId { type_id, field_id })
}

/// Field names beginning with anything but an uppercase letter are local
/// annotations: they may ride along in a field map but never hit the wire.
pub fn is_annotation(name: &str) -> bool {
    !name.starts_with(|c: char| c.is_ascii_uppercase())
}

// ---------------------------------------------------------------------------
// Enumerated UInt16 values
// ---------------------------------------------------------------------------

/// `TransactionType` codes.
pub static TRANSACTION_TYPES: &[(&str, u16)] = &[
    ("Payment", 0),
    ("SuspendedPaymentCreate", 1),
    ("SuspendedPaymentFinish", 2),
    ("AccountSet", 3),
    ("SuspendedPaymentCancel", 4),
    ("SetRegularKey", 5),
    ("NickNameSet", 6),
    ("OfferCreate", 7),
    ("OfferCancel", 8),
    ("Contract", 9),
    ("TicketCreate", 10),
    ("TicketCancel", 11),
    ("SignerListSet", 12),
    ("TrustSet", 20),
    ("EnableAmendment", 100),
    ("SetFee", 101),
];

/// `LedgerEntryType` codes.
pub static LEDGER_ENTRY_TYPES: &[(&str, u16)] = &[
    ("AccountRoot", 0x61),
    ("Contract", 0x63),
    ("DirectoryNode", 0x64),
    ("EnabledAmendments", 0x66),
    ("GeneratorMap", 0x67),
    ("LedgerHashes", 0x68),
    ("Nickname", 0x6e),
    ("Offer", 0x6f),
    ("RippleState", 0x72),
    ("FeeSettings", 0x73),
    ("SignerList", 0x53),
    ("Ticket", 0x54),
    ("SuspendedPayment", 0x75),
];

/// Look up the symbolic name of an enumerated UInt16 field value.
pub fn enum_name(field: &str, code: u16) -> Option<&'static str> {
    enum_table(field)?
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// Look up the code of an enumerated UInt16 field value by name.
pub fn enum_code(field: &str, name: &str) -> Option<u16> {
    enum_table(field)?
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, code)| *code)
}

fn enum_table(field: &str) -> Option<&'static [(&'static str, u16)]> {
    match field {
        "TransactionType" => Some(TRANSACTION_TYPES),
        "LedgerEntryType" => Some(LEDGER_ENTRY_TYPES),
        _ => None,
    }
}
