use proptest::prelude::*;

use rivet_protocol::codec::{
    decode_varint, deserialize, encode_varint, serialize, AccountId, Amount, BinaryReader,
    Currency, FieldValue, Hash256, IssuedAmount, IssuedValue, StObject,
};

const VARINT_MAX: usize = 918_744;
const MAX_DROPS: i64 = 100_000_000_000_000_000;

fn arb_account() -> impl Strategy<Value = AccountId> {
    prop::array::uniform20(any::<u8>()).prop_map(AccountId)
}

/// Native drops or a normalized issued value in one of a few currencies.
fn arb_amount() -> impl Strategy<Value = Amount> {
    let native = (-MAX_DROPS..=MAX_DROPS).prop_map(Amount::Native);
    let issued = (
        1u64..10_000_000_000_000_000,
        -80i32..60,
        any::<bool>(),
        prop::sample::select(vec!["USD", "EUR", "BTC"]),
        arb_account(),
    )
        .prop_map(|(mantissa, exponent, negative, code, issuer)| {
            Amount::Issued(IssuedAmount {
                value: IssuedValue::new(mantissa, exponent, negative).unwrap(),
                currency: Currency::from_code(code).unwrap(),
                issuer,
            })
        });
    prop_oneof![native, issued]
}

/// A transaction-shaped field map with a random subset of optional fields.
fn arb_fields() -> impl Strategy<Value = Vec<(&'static str, FieldValue)>> {
    (
        any::<u32>(),
        any::<u32>(),
        arb_account(),
        arb_account(),
        arb_amount(),
        (0i64..1_000_000).prop_map(Amount::Native),
        prop::option::of(prop::array::uniform32(any::<u8>())),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..300)),
        prop::option::of(any::<u32>()),
    )
        .prop_map(
            |(sequence, flags, account, destination, amount, fee, invoice, blob, tag)| {
                let mut fields: Vec<(&'static str, FieldValue)> = vec![
                    ("TransactionType", FieldValue::UInt16(0)),
                    ("Sequence", FieldValue::UInt32(sequence)),
                    ("Flags", FieldValue::UInt32(flags)),
                    ("Account", FieldValue::Account(account)),
                    ("Destination", FieldValue::Account(destination)),
                    ("Amount", FieldValue::Amount(amount)),
                    ("Fee", FieldValue::Amount(fee)),
                ];
                if let Some(invoice) = invoice {
                    fields.push(("InvoiceID", FieldValue::Hash256(Hash256(invoice))));
                }
                if let Some(blob) = blob {
                    fields.push(("SigningPubKey", FieldValue::Blob(blob)));
                }
                if let Some(tag) = tag {
                    fields.push(("DestinationTag", FieldValue::UInt32(tag)));
                }
                fields
            },
        )
}

fn build(fields: &[(&'static str, FieldValue)]) -> StObject {
    let mut object = StObject::new();
    for (name, value) in fields {
        object.insert(*name, value.clone());
    }
    object
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn varint_roundtrip_in_range(n in 0usize..=VARINT_MAX) {
        let bytes = encode_varint(n).unwrap();
        prop_assert!(bytes.len() <= 3);
        let mut reader = BinaryReader::new(&bytes);
        prop_assert_eq!(decode_varint(&mut reader).unwrap(), n);
    }

    #[test]
    fn varint_rejects_out_of_range(n in (VARINT_MAX + 1)..usize::MAX) {
        prop_assert!(encode_varint(n).is_err());
    }

    #[test]
    fn object_serialize_deserialize_roundtrip(fields in arb_fields()) {
        let object = build(&fields);
        let bytes = serialize(&object).unwrap();
        let decoded = deserialize(&bytes).unwrap();
        prop_assert_eq!(&decoded, &object);
        prop_assert_eq!(serialize(&decoded).unwrap(), bytes);
    }

    #[test]
    fn serialization_ignores_insertion_order(
        fields in arb_fields(),
        seed in any::<u64>(),
    ) {
        let mut shuffled = fields.clone();
        // Deterministic Fisher-Yates driven by the generated seed.
        let mut state = seed;
        for i in (1..shuffled.len()).rev() {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let j = (state >> 33) as usize % (i + 1);
            shuffled.swap(i, j);
        }
        prop_assert_eq!(
            serialize(&build(&fields)).unwrap(),
            serialize(&build(&shuffled)).unwrap()
        );
    }

    #[test]
    fn native_amount_parse_display_roundtrip(drops in -MAX_DROPS..=MAX_DROPS) {
        let amount = Amount::Native(drops);
        prop_assert_eq!(amount.to_string().parse::<Amount>().unwrap(), amount);
    }
}
