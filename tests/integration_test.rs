use object_bridge::bindings::{install_world_api, JsBridge};
use object_bridge::config::{BridgeConfig, StalePolicy};
use object_bridge::marshal::{DecodePolicy, DiagnosticDetail, NativeString, NativeValue};
use object_bridge::native::ObjectWorld;
use object_bridge::BridgeError;
use std::sync::{Arc, RwLock};

fn setup(config: BridgeConfig) -> (Arc<RwLock<ObjectWorld>>, JsBridge) {
    let world = Arc::new(RwLock::new(ObjectWorld::new()));
    let bridge = JsBridge::with_world(config, world.clone()).unwrap();
    bridge.install_builtins().unwrap();
    install_world_api(&bridge, world.clone()).unwrap();
    (world, bridge)
}

fn text(value: NativeValue) -> String {
    match value {
        NativeValue::String(s) => s.to_string(),
        other => panic!("expected a string, got {:?}", other),
    }
}

#[test]
fn test_spawn_and_destroy_from_script() {
    let (world, bridge) = setup(BridgeConfig::default());

    bridge
        .execute("var actor = World.spawn('Actor'); var name = World.className(actor);")
        .unwrap();
    assert_eq!(text(bridge.get_global("name").unwrap()), "Actor");
    assert_eq!(world.read().unwrap().object_count(), 1);

    assert_eq!(bridge.eval("World.destroy(actor)").unwrap(), NativeValue::Bool(true));
    assert_eq!(bridge.eval("Bridge.isReleased(actor)").unwrap(), NativeValue::Bool(true));
    assert_eq!(world.read().unwrap().object_count(), 0);

    // 访问已释放对象得到可捕获的异常
    let message = bridge
        .eval("(function(){ try { World.className(actor); return 'no'; } catch (e) { return e.message; } })()")
        .unwrap();
    assert_eq!(
        text(message),
        "Bad parameters #0, the native object has been released."
    );
}

#[test]
fn test_native_side_destroy_is_observed() {
    let (world, bridge) = setup(BridgeConfig::default());
    let ptr = world.write().unwrap().spawn("Door");
    bridge.set_global("door", NativeValue::Object(ptr)).unwrap();
    assert_eq!(bridge.eval("Bridge.isLive(door)").unwrap(), NativeValue::Bool(true));

    assert!(world.write().unwrap().destroy(ptr));
    assert_eq!(bridge.pump_destroy_notices(), 1);
    assert_eq!(bridge.eval("Bridge.isLive(door)").unwrap(), NativeValue::Bool(false));
    assert_eq!(bridge.eval("Bridge.isReleased(door)").unwrap(), NativeValue::Bool(true));
}

#[test]
fn test_pending_kill_counts_as_released() {
    let (_world, bridge) = setup(BridgeConfig::default());
    bridge
        .execute("var a = World.spawn('Actor'); World.markPendingKill(a);")
        .unwrap();
    assert_eq!(bridge.eval("Bridge.isLive(a)").unwrap(), NativeValue::Bool(false));
    assert_eq!(bridge.eval("Bridge.isReleased(a)").unwrap(), NativeValue::Bool(true));
    assert_eq!(bridge.eval("World.collectGarbage()").unwrap(), NativeValue::Int32(1));
    assert_eq!(bridge.eval("World.objectCount()").unwrap(), NativeValue::Int32(0));
}

#[test]
fn test_sub_object_slot() {
    let (_world, bridge) = setup(BridgeConfig::default());
    bridge
        .execute(
            "var owner = World.spawn('Actor');\n\
             var mesh = World.attachSubObject(owner, 'Mesh');\n\
             var sub = World.subObjectClass(owner);",
        )
        .unwrap();
    assert_eq!(text(bridge.get_global("sub").unwrap()), "Mesh");

    bridge.execute("World.destroy(owner);").unwrap();
    assert_eq!(bridge.eval("Bridge.isReleased(mesh)").unwrap(), NativeValue::Bool(true));
}

#[test]
fn test_bad_arguments_are_rejected_before_use() {
    let (world, bridge) = setup(BridgeConfig::default());

    let err = bridge.execute("World.spawn();").unwrap_err();
    assert!(err
        .to_string()
        .contains("Bad parameters, the function expect 1, but 0 provided."));

    let err = bridge.execute("World.spawn(5);").unwrap_err();
    assert!(err.to_string().contains("Bad parameters #0, expect a string"));

    let err = bridge.execute("World.attachSubObject(World.spawn('A'), 7);").unwrap_err();
    assert!(err.to_string().contains("#1"));

    // 只有最后一次调用里的 World.spawn('A') 产生了对象
    assert_eq!(world.read().unwrap().object_count(), 1);

    let stats = bridge.diagnostics().get_stats();
    assert_eq!(stats.by_kind.get("ArgumentCount"), Some(&1));
    assert_eq!(stats.by_kind.get("ArgumentType"), Some(&2));
    assert_eq!(stats.by_source.get("World.spawn"), Some(&2));
}

#[test]
fn test_ignore_stale_policy() {
    let mut config = BridgeConfig::default();
    config.marshal.stale_policy = StalePolicy::Ignore;
    let (_world, bridge) = setup(config);

    bridge
        .execute("var a = World.spawn('Actor'); World.destroy(a);")
        .unwrap();
    assert_eq!(bridge.eval("World.className(a)").unwrap(), NativeValue::Undefined);
}

#[test]
fn test_uncaught_exception_report() {
    let (_world, bridge) = setup(BridgeConfig::default());
    let err = bridge
        .execute("function fail() { throw new TypeError('bad state'); }\nfail();")
        .unwrap_err();
    let BridgeError::Script(record) = err else {
        panic!("expected a script error");
    };
    assert_eq!(record.message, "TypeError: bad state");
    match &record.detail {
        DiagnosticDetail::StackTrace(stack) => assert!(stack.contains("fail")),
        other => panic!("expected a stack trace, got {:?}", other),
    }

    let last = bridge.diagnostics().last_record().unwrap();
    assert_eq!(last.kind, "Script");
    assert_eq!(last.diagnostic, Some(record));
}

#[test]
fn test_utf16_file_content() -> anyhow::Result<()> {
    let (_world, bridge) = setup(BridgeConfig::default());
    let source = "var greeting = '你好';";
    let mut bytes = vec![0xFF, 0xFE];
    for unit in source.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bridge.execute_file_content("greeting.js", &bytes)?;
    assert_eq!(
        bridge.get_global("greeting")?,
        NativeValue::String(NativeString::from("你好"))
    );
    Ok(())
}

#[test]
fn test_strict_decoding_rejects_invalid_bytes() {
    let config = BridgeConfig::from_toml_str("[marshal]\ndecode_policy = \"Strict\"\n").unwrap();
    assert_eq!(config.marshal.decode_policy, DecodePolicy::Strict);
    let (_world, bridge) = setup(config);

    let err = bridge
        .execute_file_content("broken.js", b"var x = '\xFF\xFE\xFD';")
        .unwrap_err();
    assert!(matches!(err, BridgeError::Conversion(_)));
    assert_eq!(
        bridge.diagnostics().get_stats().by_source.get("broken.js"),
        Some(&1)
    );
}

#[test]
fn test_instances_are_isolated() {
    let (_w1, first) = setup(BridgeConfig::default());
    let (_w2, second) = setup(BridgeConfig::default());
    assert_ne!(first.instance_id(), second.instance_id());

    first.execute("var a = World.spawn('Actor');").unwrap();
    let handles = |bridge: &JsBridge| bridge.with_state(|s| s.handles.len()).unwrap();
    assert_eq!(handles(&first), 1);
    assert_eq!(handles(&second), 0);
}

#[test]
fn test_copied_handle_does_not_resolve() {
    let (_world, bridge) = setup(BridgeConfig::default());
    bridge
        .execute("var secret = World.spawn('Secret'); var other = World.spawn('Other');")
        .unwrap();

    assert_eq!(bridge.eval("Object.keys(secret).length").unwrap(), NativeValue::Int32(0));
    assert_eq!(
        bridge.eval("World.className(Object.assign({}, secret))").unwrap(),
        NativeValue::Undefined
    );

    bridge
        .execute("Object.assign(other, secret); other.__bridgeHandle = 1;")
        .unwrap();
    assert_eq!(text(bridge.eval("World.className(other)").unwrap()), "Other");
    assert_eq!(text(bridge.eval("World.className(secret)").unwrap()), "Secret");
}

#[test]
fn test_unreachable_handles_are_reclaimed() {
    let (world, bridge) = setup(BridgeConfig::default());
    let handles = |bridge: &JsBridge| bridge.with_state(|s| s.handles.len()).unwrap();

    bridge
        .execute("for (var i = 0; i < 10000; i++) { World.destroy(World.spawn('A')); }")
        .unwrap();
    bridge.collect_garbage();
    assert_eq!(handles(&bridge), 0);
    assert_eq!(world.read().unwrap().object_count(), 0);

    // 仍可达的句柄保留，释放引用后被回收，原生对象保持存活
    bridge.execute("var keep = World.spawn('B');").unwrap();
    bridge.collect_garbage();
    assert_eq!(handles(&bridge), 1);
    bridge.execute("keep = null;").unwrap();
    bridge.collect_garbage();
    assert_eq!(handles(&bridge), 0);
    assert_eq!(world.read().unwrap().object_count(), 1);
}

#[test]
fn test_file_errors_name_the_resource() {
    let (_world, bridge) = setup(BridgeConfig::default());
    let err = bridge
        .execute_file_content("greeting.js", b"function f() { throw new Error('x'); }\nf();")
        .unwrap_err();
    let BridgeError::Script(record) = err else {
        panic!("expected a script error");
    };
    assert!(record.to_string().contains("greeting.js"), "{}", record);
    assert_eq!(
        bridge.diagnostics().get_stats().by_source.get("greeting.js"),
        Some(&1)
    );

    let err = bridge
        .execute_file_content("broken.js", b"var = ;")
        .unwrap_err();
    assert!(err.to_string().contains("broken.js"), "{}", err);
}
