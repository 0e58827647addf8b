//! 封送层性能基准测试
//!
//! 测试字符串解码、参数校验、句柄解析以及一次完整的脚本到原生调用

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use object_bridge::bindings::{install_world_api, JsBridge};
use object_bridge::config::BridgeConfig;
use object_bridge::marshal::{
    check_types, decode_file_content, resolve_handle_to_object, ArgKind, ArgSignature, DecodePolicy,
    HandleTable, NativeString, ValueProbe, PRIMARY_SLOT,
};
use object_bridge::native::ObjectWorld;
use std::hint::black_box;
use std::sync::{Arc, RwLock};

enum Arg {
    Int(i32),
    Str,
    Obj,
}

impl ValueProbe for Arg {
    fn is_int32(&self) -> bool {
        matches!(self, Arg::Int(_))
    }
    fn is_number(&self) -> bool {
        matches!(self, Arg::Int(_))
    }
    fn is_string(&self) -> bool {
        matches!(self, Arg::Str)
    }
    fn is_external(&self) -> bool {
        false
    }
    fn is_function(&self) -> bool {
        false
    }
    fn is_object(&self) -> bool {
        matches!(self, Arg::Obj)
    }
    fn type_name(&self) -> &'static str {
        match self {
            Arg::Int(_) => "int32",
            Arg::Str => "string",
            Arg::Obj => "object",
        }
    }
}

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoding");

    for size in [64usize, 4096, 65536] {
        let source = "var value = '多字节';\n".repeat(size / 16 + 1);
        let mut utf8 = vec![0xEF, 0xBB, 0xBF];
        utf8.extend_from_slice(source.as_bytes());
        group.bench_with_input(BenchmarkId::new("utf8_bom", size), &utf8, |b, bytes| {
            b.iter(|| black_box(decode_file_content(bytes, DecodePolicy::Lossy)));
        });

        let mut utf16 = vec![0xFF, 0xFE];
        for unit in source.encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        group.bench_with_input(BenchmarkId::new("utf16_le", size), &utf16, |b, bytes| {
            b.iter(|| black_box(decode_file_content(bytes, DecodePolicy::Lossy)));
        });
    }

    let native = NativeString::from("Actor_Component_17");
    group.bench_function("native_string_to_utf8", |b| {
        b.iter(|| black_box(native.to_utf8(DecodePolicy::Strict)));
    });

    group.finish();
}

fn bench_argument_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("argument_checks");

    let signature = ArgSignature::from([ArgKind::Object, ArgKind::String, ArgKind::Int32]);
    let good = [Arg::Obj, Arg::Str, Arg::Int(3)];
    let bad = [Arg::Obj, Arg::Int(1), Arg::Int(3)];

    group.bench_function("accept", |b| {
        b.iter(|| black_box(check_types(&good, &signature)));
    });
    group.bench_function("reject", |b| {
        b.iter(|| black_box(check_types(&bad, &signature)));
    });

    group.finish();
}

fn bench_handle_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_resolution");

    let mut world = ObjectWorld::new();
    let mut table = HandleTable::default();
    let mut handles = Vec::new();
    for i in 0..1000 {
        let ptr = world.spawn("Actor");
        let handle = table.create_handle().unwrap();
        table.attach(handle, ptr, PRIMARY_SLOT).unwrap();
        if i % 2 == 0 {
            world.destroy(ptr);
        }
        handles.push(handle);
    }

    group.bench_function("resolve_1000", |b| {
        b.iter(|| {
            for handle in &handles {
                black_box(resolve_handle_to_object(&table, Some(*handle), PRIMARY_SLOT, &world));
            }
        });
    });

    group.finish();
}

fn bench_script_calls(c: &mut Criterion) {
    let world = Arc::new(RwLock::new(ObjectWorld::new()));
    let bridge = JsBridge::with_world(BridgeConfig::default(), world.clone()).unwrap();
    install_world_api(&bridge, world).unwrap();
    bridge
        .execute("var actor = World.spawn('Actor'); function touch() { return World.className(actor); }")
        .unwrap();

    c.bench_function("script_native_call", |b| {
        b.iter(|| black_box(bridge.call_function("touch", vec![]).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_decoding,
    bench_argument_checks,
    bench_handle_resolution,
    bench_script_calls
);
criterion_main!(benches);
