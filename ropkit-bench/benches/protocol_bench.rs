//! Codec and buffer packing benchmarks.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ropkit_protocol::rop::{ModifyPermissionsRequest, PropertyRow, QueryRowsResponse};
use ropkit_protocol::{
    pack, tags, unpack, HandleIndex, PropertyValue, RopRequest, RopResponse, RowChange, RowOp,
    TaggedPropertyValue,
};

fn member_values(rights: i32) -> Vec<TaggedPropertyValue> {
    vec![
        TaggedPropertyValue::new(tags::PID_TAG_MEMBER_ID, PropertyValue::Integer64(7)),
        TaggedPropertyValue::new(
            tags::PID_TAG_MEMBER_NAME,
            PropertyValue::Unicode("benchmark-user@example.com".to_string()),
        ),
        TaggedPropertyValue::new(tags::PID_TAG_MEMBER_RIGHTS, PropertyValue::Integer32(rights)),
        TaggedPropertyValue::new(tags::PID_TAG_ENTRY_ID, PropertyValue::Binary(vec![0xAB; 64])),
    ]
}

fn modify_request(row_count: usize) -> RopRequest {
    RopRequest::ModifyPermissions(ModifyPermissionsRequest {
        logon_id: 0,
        input_handle_index: 0,
        modify_flags: 0,
        rows: (0..row_count)
            .map(|i| RowChange::new(RowOp::Add, member_values(i as i32)))
            .collect(),
    })
}

fn bench_value_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_encode");

    for size in [16, 256, 4096] {
        let value = TaggedPropertyValue::new(
            tags::PID_TAG_ENTRY_ID,
            PropertyValue::Binary(vec![0x42; size]),
        );
        group.throughput(Throughput::Bytes(value.encoded_len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| {
                let mut buf = BytesMut::with_capacity(value.encoded_len());
                value.encode(&mut buf).unwrap();
                black_box(buf)
            });
        });
    }

    group.finish();
}

fn bench_value_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_decode");

    for size in [16, 256, 4096] {
        let value = TaggedPropertyValue::new(
            tags::PID_TAG_ENTRY_ID,
            PropertyValue::Binary(vec![0x42; size]),
        );
        let mut buf = BytesMut::new();
        value.encode(&mut buf).unwrap();

        group.throughput(Throughput::Bytes(buf.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &buf, |b, buf| {
            b.iter(|| {
                let mut slice = &buf[..];
                black_box(TaggedPropertyValue::decode(&mut slice).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");

    for rows in [1, 16, 64] {
        let requests = vec![modify_request(rows)];
        let indices = vec![HandleIndex::AMBIENT];

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &requests, |b, requests| {
            b.iter(|| black_box(pack(requests, &indices).unwrap()));
        });
    }

    group.finish();
}

fn bench_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack");

    for rows in [1, 16, 64] {
        let response = RopResponse::QueryRows(QueryRowsResponse {
            handle_index: 1,
            origin: 2,
            rows: (0..rows).map(|i| PropertyRow::new(member_values(i))).collect(),
        });
        let encoded = response.to_bytes().unwrap();
        let buffer = ropkit_protocol::frame_responses(&encoded, &[]).unwrap();

        group.throughput(Throughput::Bytes(buffer.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &buffer, |b, buffer| {
            b.iter(|| black_box(unpack(buffer, 1, u32::MAX).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_value_encode,
    bench_value_decode,
    bench_pack,
    bench_unpack,
);

criterion_main!(benches);
