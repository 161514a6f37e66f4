//! Parse and encode throughput for typical session and order traffic.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fix_codec::validation::checksum::{calculate_checksum, format_checksum};
use fix_codec::{
    encode, DictionaryBuilder, FieldDef, FieldType, GroupDef, MessageCategory, MessageDef,
    MessageParser, ParseOptions, Validator,
};
use fix_types::SOH;
use std::sync::Arc;

fn wire(pipes: &str) -> Vec<u8> {
    let body: Vec<u8> = pipes.bytes().map(|b| if b == b'|' { SOH } else { b }).collect();
    let mut raw = format!("8=FIX.4.4\x019={}\x01", body.len()).into_bytes();
    raw.extend_from_slice(&body);
    let sum = calculate_checksum(&raw);
    raw.extend_from_slice(b"10=");
    raw.extend_from_slice(&format_checksum(sum));
    raw.push(SOH);
    raw
}

fn bench_codec(c: &mut Criterion) {
    let dd = Arc::new(
        DictionaryBuilder::new("FIX.4.4")
            .standard_header_trailer()
            .session_messages()
            .field(FieldDef::new(11, "ClOrdID", FieldType::String))
            .field(FieldDef::new(55, "Symbol", FieldType::String))
            .field(FieldDef::new(54, "Side", FieldType::Char).with_values(["1", "2"]))
            .field(FieldDef::new(38, "OrderQty", FieldType::Qty))
            .field(FieldDef::new(44, "Price", FieldType::Price))
            .field(FieldDef::new(453, "NoPartyIDs", FieldType::NumInGroup))
            .field(FieldDef::new(448, "PartyID", FieldType::String))
            .field(FieldDef::new(452, "PartyRole", FieldType::Int))
            .message(
                MessageDef::new("D", "NewOrderSingle", MessageCategory::App)
                    .field(11, true)
                    .group(GroupDef::new(453, 448).field(452, false), false)
                    .field(55, true)
                    .field(54, true)
                    .field(38, false)
                    .field(44, false),
            )
            .build()
            .expect("bench dictionary"),
    );

    let heartbeat = wire("35=0|49=SENDER|56=TARGET|34=12|52=20240102-03:04:05.678|");
    let order = wire(
        "35=D|49=SENDER|56=TARGET|34=13|52=20240102-03:04:05.678|11=ORD-000013|453=2|448=DESK1|452=1|448=TRADER7|452=11|55=MSFT|54=1|38=100|44=412.25|",
    );
    let parser = MessageParser::new(ParseOptions::default()).with_dictionary(dd.clone());
    let validator = Validator::default();

    let mut group = c.benchmark_group("codec");
    group.throughput(Throughput::Bytes(heartbeat.len() as u64));
    group.bench_function("parse_heartbeat", |b| {
        b.iter(|| parser.parse(black_box(&heartbeat)))
    });

    group.throughput(Throughput::Bytes(order.len() as u64));
    group.bench_function("parse_order_with_group", |b| {
        b.iter(|| parser.parse(black_box(&order)))
    });

    let parsed = parser.parse(&order).expect("bench order parses");
    group.bench_function("encode_order", |b| b.iter(|| encode(black_box(&parsed))));
    group.bench_function("validate_order", |b| {
        b.iter(|| validator.validate(black_box(&parsed), &dd, &dd, false))
    });
    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
