//! JavaScript Binding Adapter using rquickjs
//!
//! 把封送层接到 QuickJS 上：
//! - 脚本句柄是 [`NativeHandle`] 类实例，句柄编号在脚本中不可见，指针保存在实例的侧表中
//! - 句柄对象被回收后，侧表中的条目随之移除
//! - 注册的原生函数先做参数校验，通过后才构造 [`NativeCall`]
//! - 所有失败都以可捕获的脚本异常返回给脚本

use rquickjs::class::{ClassId, JsClass, Readable, Trace, Tracer};
use rquickjs::convert::Coerced;
use rquickjs::prelude::Rest;
use rquickjs::function::Constructor;
use rquickjs::{
    qjs, CatchResultExt, CaughtError, Class, Context, Ctx, Exception, FromJs, Function, Object,
    Runtime, String as JsString, Value,
};
use std::ffi::CString;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};

use crossbeam_channel::{Receiver, Sender};

use crate::config::{BridgeConfig, MarshalConfig, StalePolicy};
use crate::core::error::{BridgeError, BridgeResult};
use crate::core::error_aggregator::DiagnosticAggregator;
use crate::marshal::args::{check_types, ArgKind, ArgSignature, ValueProbe};
use crate::marshal::exception::{describe, CaughtException, DiagnosticRecord, SourceLocation};
use crate::marshal::instance::{InstanceId, InstanceRegistry};
use crate::marshal::liveness::{resolve_handle_to_object, Resolved, ValidityOracle};
use crate::marshal::name::{NameTable, NativeName};
use crate::marshal::tagger::{HandleId, HandleTable, NativePtr, PRIMARY_SLOT};
use crate::marshal::value::{decode_file_content, NativeString, NativeValue};
use crate::native::world::{DestroyNotice, ObjectWorld};

/// 句柄对象的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Object,
    External,
}

/// 脚本侧的句柄对象
///
/// 句柄编号保存在类实例内部，脚本既读不到也改不了；普通对象即使复制了
/// 句柄上的属性也不会被当作句柄。引擎回收该对象时，编号经由通道送回实例，
/// 下次进入实例时从侧表中移除。
pub struct NativeHandle {
    id: HandleId,
    kind: HandleKind,
    reclaim: Sender<HandleId>,
}

impl NativeHandle {
    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }
}

impl<'js> Trace<'js> for NativeHandle {
    fn trace<'a>(&self, _tracer: Tracer<'a, 'js>) {}
}

impl<'js> JsClass<'js> for NativeHandle {
    const NAME: &'static str = "NativeHandle";

    type Mutable = Readable;

    fn class_id() -> &'static ClassId {
        static ID: ClassId = ClassId::new();
        &ID
    }

    fn prototype(ctx: &Ctx<'js>) -> rquickjs::Result<Option<Object<'js>>> {
        Ok(Some(Object::new(ctx.clone())?))
    }

    fn constructor(_ctx: &Ctx<'js>) -> rquickjs::Result<Option<Constructor<'js>>> {
        Ok(None)
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        // 在 GC 中执行，不能获取实例锁；实例已停止时发送失败
        let _ = self.reclaim.send(self.id);
    }
}

/// 每个引擎实例的上下文数据
pub struct InstanceState {
    pub handles: HandleTable,
    pub names: NameTable,
    pub config: MarshalConfig,
    oracle: Arc<dyn ValidityOracle + Send + Sync>,
    reclaim_tx: Sender<HandleId>,
    reclaimed: Receiver<HandleId>,
}

impl InstanceState {
    pub fn new(oracle: Arc<dyn ValidityOracle + Send + Sync>, config: MarshalConfig) -> Self {
        let (reclaim_tx, reclaimed) = crossbeam_channel::unbounded();
        Self {
            handles: HandleTable::new(config.max_slots_per_handle),
            names: NameTable::new(),
            config,
            oracle,
            reclaim_tx,
            reclaimed,
        }
    }

    /// 解析句柄槽位
    pub fn resolve(&self, handle: Option<HandleId>, index: usize) -> Resolved {
        resolve_handle_to_object(&self.handles, handle, index, &*self.oracle)
    }

    /// 移除已被引擎回收的句柄，返回移除的条目数
    pub fn reclaim_handles(&mut self) -> usize {
        let handles = &mut self.handles;
        let count = self
            .reclaimed
            .try_iter()
            .filter(|id| handles.detach(*id))
            .count();
        if count > 0 {
            tracing::trace!(target: "bridge.handles", "Reclaimed {} handle(s)", count);
        }
        count
    }
}

fn instances() -> &'static InstanceRegistry<InstanceState> {
    static INSTANCES: OnceLock<InstanceRegistry<InstanceState>> = OnceLock::new();
    INSTANCES.get_or_init(InstanceRegistry::new)
}

fn lock_state(state: &Mutex<InstanceState>) -> BridgeResult<MutexGuard<'_, InstanceState>> {
    state
        .lock()
        .map_err(|_| BridgeError::Instance("instance state is poisoned".to_string()))
}

// ============================================================================
// 类型谓词
// ============================================================================

impl<'js> ValueProbe for Value<'js> {
    fn is_int32(&self) -> bool {
        if self.is_int() {
            return true;
        }
        match self.as_float() {
            Some(f) => {
                f.fract() == 0.0
                    && f >= i32::MIN as f64
                    && f <= i32::MAX as f64
                    && !(f == 0.0 && f.is_sign_negative())
            }
            None => false,
        }
    }

    fn is_number(&self) -> bool {
        self.is_int() || self.is_float()
    }

    fn is_string(&self) -> bool {
        Value::is_string(self)
    }

    fn is_external(&self) -> bool {
        external_of(self).is_some()
    }

    fn is_function(&self) -> bool {
        Value::is_function(self)
    }

    fn is_object(&self) -> bool {
        Value::is_object(self) || Value::is_function(self) || Value::is_array(self)
    }

    fn type_name(&self) -> &'static str {
        if self.is_undefined() {
            "undefined"
        } else if self.is_null() {
            "null"
        } else if self.is_bool() {
            "boolean"
        } else if self.is_int() {
            "int32"
        } else if self.is_float() {
            "number"
        } else if Value::is_string(self) {
            "string"
        } else if Value::is_function(self) {
            "function"
        } else if Value::is_array(self) {
            "array"
        } else if Value::is_object(self) {
            "object"
        } else {
            "unknown"
        }
    }
}

// 只比较对象的类编号，不读取属性，也不会执行脚本
fn handle_with_kind<'js>(value: &Value<'js>, kind: HandleKind) -> Option<HandleId> {
    let class = value
        .as_object()
        .cloned()
        .and_then(Class::<NativeHandle>::from_object)?;
    let handle = class.borrow();
    (handle.kind == kind).then_some(handle.id)
}

/// 取出脚本值上的句柄编号；非对象或普通对象返回 `None`
pub fn handle_of<'js>(value: &Value<'js>) -> Option<HandleId> {
    handle_with_kind(value, HandleKind::Object)
}

/// 取出外部值上的句柄编号
pub fn external_of<'js>(value: &Value<'js>) -> Option<HandleId> {
    handle_with_kind(value, HandleKind::External)
}

// ============================================================================
// 值转换
// ============================================================================

fn js_string<'js>(ctx: &Ctx<'js>, text: &str) -> BridgeResult<Value<'js>> {
    Ok(JsString::from_str(ctx.clone(), text)?.into_value())
}

fn wrap_pointer<'js>(
    ctx: &Ctx<'js>,
    state: &Mutex<InstanceState>,
    ptr: NativePtr,
    kind: HandleKind,
) -> BridgeResult<Value<'js>> {
    let handle = {
        let mut state = lock_state(state)?;
        state.reclaim_handles();
        let id = state.handles.create_handle()?;
        if let Err(err) = state.handles.attach(id, ptr, PRIMARY_SLOT) {
            state.handles.detach(id);
            return Err(err);
        }
        NativeHandle {
            id,
            kind,
            reclaim: state.reclaim_tx.clone(),
        }
    };
    // 创建失败时句柄随之 drop，编号同样会被回收
    Ok(Class::instance(ctx.clone(), handle)?.into_value())
}

/// 原生值转脚本值
pub fn to_script<'js>(
    ctx: &Ctx<'js>,
    state: &Mutex<InstanceState>,
    value: NativeValue,
) -> BridgeResult<Value<'js>> {
    match value {
        NativeValue::Undefined => Ok(Value::new_undefined(ctx.clone())),
        NativeValue::Null => Ok(Value::new_null(ctx.clone())),
        NativeValue::Bool(b) => Ok(Value::new_bool(ctx.clone(), b)),
        NativeValue::Int32(i) => Ok(Value::new_int(ctx.clone(), i)),
        NativeValue::Number(n) => Ok(Value::new_float(ctx.clone(), n)),
        NativeValue::String(s) => {
            let policy = lock_state(state)?.config.decode_policy;
            js_string(ctx, &s.to_utf8(policy)?)
        }
        NativeValue::Name(name) => {
            let text = lock_state(state)?
                .names
                .display(name)
                .ok_or_else(|| BridgeError::Conversion("name is not in this instance's table".to_string()))?;
            js_string(ctx, &text)
        }
        NativeValue::Text(text) => js_string(ctx, &text),
        NativeValue::Object(ptr) => wrap_pointer(ctx, state, ptr, HandleKind::Object),
        NativeValue::External(ptr) => wrap_pointer(ctx, state, ptr, HandleKind::External),
    }
}

/// 脚本值转原生值
///
/// `index` 只用于错误信息。句柄对象会经过活性检查，已释放的对象返回
/// [`BridgeError::StaleReference`]。
pub fn from_script<'js>(
    value: &Value<'js>,
    index: usize,
    state: &Mutex<InstanceState>,
) -> BridgeResult<NativeValue> {
    if value.is_undefined() {
        return Ok(NativeValue::Undefined);
    }
    if value.is_null() {
        return Ok(NativeValue::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(NativeValue::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(NativeValue::Int32(i));
    }
    if let Some(f) = value.as_float() {
        return Ok(NativeValue::Number(f));
    }
    if let Some(s) = value.as_string() {
        return Ok(NativeValue::String(NativeString::from(s.to_string()?)));
    }
    if let Some(handle) = external_of(value) {
        return match lock_state(state)?.resolve(Some(handle), PRIMARY_SLOT) {
            Resolved::Live(ptr) => Ok(NativeValue::External(ptr)),
            Resolved::Released => Err(BridgeError::StaleReference { index }),
            Resolved::Absent => Ok(NativeValue::Null),
        };
    }
    if let Some(handle) = handle_of(value) {
        return match lock_state(state)?.resolve(Some(handle), PRIMARY_SLOT) {
            Resolved::Live(ptr) => Ok(NativeValue::Object(ptr)),
            Resolved::Released => Err(BridgeError::StaleReference { index }),
            Resolved::Absent => Ok(NativeValue::Null),
        };
    }
    Err(BridgeError::Conversion(format!(
        "cannot marshal a script {} at #{}",
        value.type_name(),
        index
    )))
}

// ============================================================================
// 异常桥接
// ============================================================================

/// 把桥接错误作为脚本异常抛出
pub fn throw_error<'js>(ctx: &Ctx<'js>, err: &BridgeError) -> rquickjs::Error {
    Exception::throw_message(ctx, &err.to_string())
}

// 以资源名作为文件名求值，调用栈中显示的是资源名
fn eval_named<'js>(ctx: &Ctx<'js>, resource: &str, code: &str) -> rquickjs::Result<Value<'js>> {
    let file_name = CString::new(resource)?;
    let source = CString::new(code)?;
    let flags = (qjs::JS_EVAL_TYPE_GLOBAL | qjs::JS_EVAL_FLAG_STRICT) as i32;
    // SAFETY: 上下文指针来自存活的 `Ctx`，两个 C 字符串在调用期间有效；
    // 返回值的所有权交给 `Value`
    let value = unsafe {
        let raw = qjs::JS_Eval(
            ctx.as_raw().as_ptr(),
            source.as_ptr(),
            code.len() as _,
            file_name.as_ptr(),
            flags,
        );
        Value::from_raw(ctx.clone(), raw)
    };
    if value.is_exception() {
        Err(rquickjs::Error::Exception)
    } else {
        Ok(value)
    }
}

fn read_prop<'js, T: FromJs<'js>>(ctx: &Ctx<'js>, obj: &Object<'js>, key: &str) -> Option<T> {
    match obj.get::<_, Option<T>>(key) {
        Ok(value) => value,
        Err(_) => {
            let _ = ctx.catch();
            None
        }
    }
}

fn display_value<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    match value.get::<Coerced<String>>() {
        Ok(text) => text.0,
        Err(_) => {
            let _ = ctx.catch();
            format!("<uncaught {}>", value.type_name())
        }
    }
}

/// 从捕获的引擎异常中读取原始信息
///
/// 每次属性读取都被单独保护，失败时当作缺失，并清掉读取过程中产生的异常。
pub fn caught_exception<'js>(ctx: &Ctx<'js>, caught: CaughtError<'js>) -> CaughtException {
    match caught {
        CaughtError::Exception(exception) => {
            let obj = exception.as_object();
            let name = read_prop::<String>(ctx, obj, "name");
            let message = read_prop::<String>(ctx, obj, "message");
            let message = match (name, message) {
                (Some(name), Some(message)) if !message.is_empty() => format!("{}: {}", name, message),
                (Some(name), _) => name,
                (None, Some(message)) => message,
                (None, None) => "Error".to_string(),
            };
            let stack = read_prop::<String>(ctx, obj, "stack");
            let location = read_prop::<String>(ctx, obj, "fileName").map(|resource| SourceLocation {
                resource,
                line: read_prop::<i32>(ctx, obj, "lineNumber").unwrap_or(0),
                column: read_prop::<i32>(ctx, obj, "columnNumber").unwrap_or(0),
            });
            CaughtException {
                message,
                stack,
                location,
            }
        }
        CaughtError::Value(value) => CaughtException::new(display_value(ctx, &value)),
        CaughtError::Error(err) => CaughtException::new(err.to_string()),
    }
}

// ============================================================================
// 原生函数
// ============================================================================

/// 一次已通过参数校验的原生调用
pub struct NativeCall<'js> {
    ctx: Ctx<'js>,
    args: Vec<Value<'js>>,
    state: Arc<Mutex<InstanceState>>,
}

impl<'js> NativeCall<'js> {
    pub fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn arg(&self, index: usize) -> Option<&Value<'js>> {
        self.args.get(index)
    }

    fn value(&self, index: usize) -> BridgeResult<&Value<'js>> {
        self.args.get(index).ok_or(BridgeError::ArgumentCount {
            expected: index + 1,
            provided: self.args.len(),
        })
    }

    fn mismatch(&self, index: usize, expected: ArgKind) -> BridgeError {
        BridgeError::ArgumentType {
            index,
            expected,
            actual: self.args.get(index).map(|v| v.type_name()).unwrap_or("undefined"),
        }
    }

    pub fn int32(&self, index: usize) -> BridgeResult<i32> {
        let value = self.value(index)?;
        if let Some(i) = value.as_int() {
            return Ok(i);
        }
        match value.as_float() {
            Some(f) if value.is_int32() => Ok(f as i32),
            _ => Err(self.mismatch(index, ArgKind::Int32)),
        }
    }

    pub fn number(&self, index: usize) -> BridgeResult<f64> {
        let value = self.value(index)?;
        value
            .as_int()
            .map(f64::from)
            .or_else(|| value.as_float())
            .ok_or_else(|| self.mismatch(index, ArgKind::Number))
    }

    pub fn string(&self, index: usize) -> BridgeResult<NativeString> {
        Ok(NativeString::from(self.text(index)?))
    }

    pub fn text(&self, index: usize) -> BridgeResult<String> {
        let value = self.value(index)?;
        let s = value
            .as_string()
            .ok_or_else(|| self.mismatch(index, ArgKind::String))?;
        Ok(s.to_string()?)
    }

    /// 字符串参数驻留为名称
    pub fn name(&self, index: usize) -> BridgeResult<NativeName> {
        let text = self.text(index)?;
        self.with_state(|state| state.names.intern(&text))?
    }

    /// 任意参数转原生值
    pub fn native_value(&self, index: usize) -> BridgeResult<NativeValue> {
        from_script(self.value(index)?, index, &self.state)
    }

    /// 句柄参数在指定槽位上的三态解析结果
    pub fn resolve(&self, index: usize, slot: usize) -> BridgeResult<Resolved> {
        let handle = self.arg(index).and_then(handle_of);
        self.with_state(|state| state.resolve(handle, slot))
    }

    /// 句柄参数的主对象；已释放时返回错误而不是 `None`
    pub fn object(&self, index: usize) -> BridgeResult<Option<NativePtr>> {
        self.object_slot(index, PRIMARY_SLOT)
    }

    pub fn object_slot(&self, index: usize, slot: usize) -> BridgeResult<Option<NativePtr>> {
        self.resolve(index, slot)?.into_live(index)
    }

    /// 外部值参数
    pub fn external(&self, index: usize) -> BridgeResult<Option<NativePtr>> {
        let handle = self.arg(index).and_then(external_of);
        self.with_state(|state| state.resolve(handle, PRIMARY_SLOT))?
            .into_live(index)
    }

    /// 在句柄参数的某个槽位挂载指针
    pub fn attach(&self, index: usize, ptr: NativePtr, slot: usize) -> BridgeResult<()> {
        let handle = self
            .arg(index)
            .and_then(handle_of)
            .ok_or_else(|| self.mismatch(index, ArgKind::Object))?;
        self.with_state(|state| state.handles.attach(handle, ptr, slot))?
    }

    pub fn function(&self, index: usize) -> BridgeResult<Function<'js>> {
        self.value(index)?
            .as_function()
            .cloned()
            .ok_or_else(|| self.mismatch(index, ArgKind::Function))
    }

    /// 调用函数参数，脚本异常转为诊断记录
    pub fn call_function(&self, index: usize, args: Vec<NativeValue>) -> BridgeResult<NativeValue> {
        let func = self.function(index)?;
        let js_args = args
            .into_iter()
            .map(|arg| to_script(&self.ctx, &self.state, arg))
            .collect::<BridgeResult<Vec<_>>>()?;
        match func.call::<_, Value>((Rest(js_args),)).catch(&self.ctx) {
            Ok(result) => from_script(&result, index, &self.state),
            Err(caught) => Err(BridgeError::Script(describe(&caught_exception(&self.ctx, caught)))),
        }
    }

    /// 访问实例数据；不要在闭包中回调脚本
    pub fn with_state<R>(&self, f: impl FnOnce(&mut InstanceState) -> R) -> BridgeResult<R> {
        let mut state = lock_state(&self.state)?;
        Ok(f(&mut state))
    }
}

/// 暴露给脚本的原生函数
pub trait NativeFunction {
    fn name(&self) -> &str;

    fn signature(&self) -> &ArgSignature;

    fn call<'js>(&self, call: &NativeCall<'js>) -> BridgeResult<NativeValue>;
}

struct FnEntry<F> {
    name: String,
    signature: ArgSignature,
    f: F,
}

impl<F> NativeFunction for FnEntry<F>
where
    F: for<'js> Fn(&NativeCall<'js>) -> BridgeResult<NativeValue>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> &ArgSignature {
        &self.signature
    }

    fn call<'js>(&self, call: &NativeCall<'js>) -> BridgeResult<NativeValue> {
        (self.f)(call)
    }
}

fn invoke<'js>(
    ctx: &Ctx<'js>,
    instance: InstanceId,
    entry: &dyn NativeFunction,
    args: Vec<Value<'js>>,
) -> BridgeResult<Value<'js>> {
    // 先校验，再触碰任何参数
    check_types(&args, entry.signature())?;

    let state = instances()
        .get(instance)
        .ok_or_else(|| BridgeError::Instance(format!("{} is not running", instance)))?;
    let call = NativeCall {
        ctx: ctx.clone(),
        args,
        state: Arc::clone(&state),
    };

    match entry.call(&call) {
        Ok(result) => to_script(ctx, &state, result),
        Err(BridgeError::StaleReference { index }) => {
            let policy = lock_state(&state)?.config.stale_policy;
            if policy == StalePolicy::Throw {
                return Err(BridgeError::StaleReference { index });
            }
            tracing::debug!(target: "bridge.liveness", "{}: ignored released object at #{}", entry.name(), index);
            Ok(Value::new_undefined(ctx.clone()))
        }
        Err(err) => Err(err),
    }
}

fn dispatch<'js>(
    ctx: &Ctx<'js>,
    instance: InstanceId,
    entry: &dyn NativeFunction,
    diagnostics: &DiagnosticAggregator,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    invoke(ctx, instance, entry, args).map_err(|err| {
        diagnostics.record_error(&err, entry.name());
        throw_error(ctx, &err)
    })
}

fn install<'js>(
    ctx: &Ctx<'js>,
    target: &Object<'js>,
    name: &str,
    instance: InstanceId,
    entry: Rc<dyn NativeFunction>,
    diagnostics: DiagnosticAggregator,
) -> rquickjs::Result<()> {
    let func = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            dispatch(&ctx, instance, entry.as_ref(), &diagnostics, args.0)
        },
    )?;
    target.set(name, func)
}

// 沿 `A.B.c` 路径找到（必要时创建）命名空间对象
fn namespace_object<'js>(ctx: &Ctx<'js>, parts: &[&str]) -> rquickjs::Result<Object<'js>> {
    let mut current = ctx.globals();
    for part in parts {
        let existing: Option<Object<'js>> = current.get(*part)?;
        current = match existing {
            Some(obj) => obj,
            None => {
                let obj = Object::new(ctx.clone())?;
                current.set(*part, obj.clone())?;
                obj
            }
        };
    }
    Ok(current)
}

// ============================================================================
// 桥接器
// ============================================================================

/// QuickJS 桥接器
///
/// 一个桥接器对应一个引擎实例。创建时登记实例数据，销毁时移除。
pub struct JsBridge {
    /// 用于主动触发垃圾回收，回收不可达的句柄对象
    runtime: Runtime,
    context: Context,
    instance: InstanceId,
    notices: Option<Receiver<DestroyNotice>>,
    diagnostics: DiagnosticAggregator,
    config: BridgeConfig,
}

impl JsBridge {
    /// 使用任意有效性判定创建桥接器
    pub fn new(
        config: BridgeConfig,
        oracle: Arc<dyn ValidityOracle + Send + Sync>,
    ) -> BridgeResult<Self> {
        config
            .validate()
            .map_err(|e| BridgeError::Engine(e.to_string()))?;
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        let instance = instances().start(InstanceState::new(oracle, config.marshal.clone()));
        let diagnostics = DiagnosticAggregator::with_config(&config.diagnostics);

        Ok(Self {
            runtime,
            context,
            instance,
            notices: None,
            diagnostics,
            config,
        })
    }

    /// 绑定到原生对象世界，并订阅它的销毁通知
    pub fn with_world(config: BridgeConfig, world: Arc<RwLock<ObjectWorld>>) -> BridgeResult<Self> {
        let notices = world
            .read()
            .map_err(|_| BridgeError::Engine("object world lock is poisoned".to_string()))?
            .destroy_notices();
        let oracle: Arc<dyn ValidityOracle + Send + Sync> = world;
        let mut bridge = Self::new(config, oracle)?;
        bridge.notices = Some(notices);
        Ok(bridge)
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &DiagnosticAggregator {
        &self.diagnostics
    }

    fn state(&self) -> BridgeResult<Arc<Mutex<InstanceState>>> {
        instances()
            .get(self.instance)
            .ok_or_else(|| BridgeError::Instance(format!("{} is not running", self.instance)))
    }

    /// 访问实例数据
    pub fn with_state<R>(&self, f: impl FnOnce(&mut InstanceState) -> R) -> BridgeResult<R> {
        instances().with(self.instance, f)
    }

    /// 注册原生函数，`path` 形如 `"World.spawn"`
    pub fn register<F>(
        &self,
        path: &str,
        signature: impl Into<ArgSignature>,
        f: F,
    ) -> BridgeResult<()>
    where
        F: for<'js> Fn(&NativeCall<'js>) -> BridgeResult<NativeValue> + 'static,
    {
        let entry = FnEntry {
            name: path.to_string(),
            signature: signature.into(),
            f,
        };
        self.register_function(Rc::new(entry))
    }

    /// 注册实现了 [`NativeFunction`] 的对象
    pub fn register_function(&self, entry: Rc<dyn NativeFunction>) -> BridgeResult<()> {
        let path = entry.name().to_string();
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        let Some((leaf, namespace)) = parts.split_last() else {
            return Err(BridgeError::Engine("empty function path".to_string()));
        };

        let instance = self.instance;
        let diagnostics = self.diagnostics.clone();
        self.context.with(|ctx| -> BridgeResult<()> {
            let target = namespace_object(&ctx, namespace)?;
            install(&ctx, &target, leaf, instance, entry, diagnostics)?;
            Ok(())
        })?;
        tracing::debug!(target: "bridge.script", "Registered native function {}", path);
        Ok(())
    }

    /// 注册内置的活性查询函数
    ///
    /// - `Bridge.isLive(obj)`
    /// - `Bridge.isReleased(obj)`
    pub fn install_builtins(&self) -> BridgeResult<()> {
        self.register("Bridge.isLive", [ArgKind::Object], |call| {
            Ok(NativeValue::Bool(call.resolve(0, PRIMARY_SLOT)?.is_live()))
        })?;
        self.register("Bridge.isReleased", [ArgKind::Object], |call| {
            Ok(NativeValue::Bool(call.resolve(0, PRIMARY_SLOT)?.is_released()))
        })?;
        Ok(())
    }

    /// 设置全局变量
    pub fn set_global(&self, name: &str, value: NativeValue) -> BridgeResult<()> {
        let state = self.state()?;
        self.context.with(|ctx| -> BridgeResult<()> {
            let js_value = to_script(&ctx, &state, value)?;
            ctx.globals().set(name, js_value)?;
            Ok(())
        })
    }

    /// 读取全局变量
    pub fn get_global(&self, name: &str) -> BridgeResult<NativeValue> {
        let state = self.state()?;
        self.context.with(|ctx| -> BridgeResult<NativeValue> {
            let value: Value = ctx.globals().get(name)?;
            from_script(&value, 0, &state)
        })
    }

    /// 执行脚本代码
    pub fn execute(&self, code: &str) -> BridgeResult<()> {
        self.run("<eval>", code, |_, _, _| Ok(NativeValue::Undefined))
            .map(|_| ())
    }

    /// 执行脚本表达式并返回结果
    pub fn eval(&self, code: &str) -> BridgeResult<NativeValue> {
        self.run("<eval>", code, |_, value, state| from_script(value, 0, state))
    }

    /// 执行文件内容，自动识别编码标记
    pub fn execute_file_content(&self, resource: &str, bytes: &[u8]) -> BridgeResult<()> {
        let source = decode_file_content(bytes, self.config.marshal.decode_policy)
            .map_err(|err| {
                self.diagnostics.record_error(&err, resource);
                err
            })?;
        self.run(resource, &source, |_, _, _| Ok(NativeValue::Undefined))
            .map(|_| ())
    }

    fn run<F>(&self, resource: &str, code: &str, convert: F) -> BridgeResult<NativeValue>
    where
        F: for<'js> FnOnce(&Ctx<'js>, &Value<'js>, &Mutex<InstanceState>) -> BridgeResult<NativeValue>,
    {
        self.pump_destroy_notices();
        self.reclaim_handles();
        let state = self.state()?;
        self.context.with(|ctx| {
            match eval_named(&ctx, resource, code).catch(&ctx) {
                Ok(value) => convert(&ctx, &value, &*state),
                Err(caught) => {
                    let record = describe(&caught_exception(&ctx, caught));
                    Err(self.report(resource, record))
                }
            }
        })
    }

    /// 调用全局脚本函数
    pub fn call_function(&self, name: &str, args: Vec<NativeValue>) -> BridgeResult<NativeValue> {
        self.pump_destroy_notices();
        self.reclaim_handles();
        let state = self.state()?;
        self.context.with(|ctx| -> BridgeResult<NativeValue> {
            let func: Option<Function> = ctx.globals().get(name)?;
            let func = func.ok_or_else(|| BridgeError::Engine(format!("Function '{}' not found", name)))?;
            let js_args = args
                .into_iter()
                .map(|arg| to_script(&ctx, &state, arg))
                .collect::<BridgeResult<Vec<_>>>()?;
            match func.call::<_, Value>((Rest(js_args),)).catch(&ctx) {
                Ok(value) => from_script(&value, 0, &state),
                Err(caught) => {
                    let record = describe(&caught_exception(&ctx, caught));
                    Err(self.report(name, record))
                }
            }
        })
    }

    /// 处理原生侧的销毁通知，返回被标记为已释放的槽位数
    pub fn pump_destroy_notices(&self) -> usize {
        let Some(notices) = &self.notices else {
            return 0;
        };
        let released: Vec<NativePtr> = notices.try_iter().map(|notice| notice.ptr).collect();
        if released.is_empty() {
            return 0;
        }
        self.with_state(|state| {
            released
                .into_iter()
                .map(|ptr| state.handles.mark_released(ptr))
                .sum()
        })
        .unwrap_or(0)
    }

    /// 执行一次完整的垃圾回收，并移除不可达句柄的侧表条目
    ///
    /// 返回移除的条目数。原生对象不受影响。
    pub fn collect_garbage(&self) -> usize {
        self.runtime.run_gc();
        self.reclaim_handles()
    }

    fn reclaim_handles(&self) -> usize {
        self.with_state(InstanceState::reclaim_handles).unwrap_or(0)
    }

    /// 直接通知某个原生对象已销毁
    pub fn notify_destroyed(&self, ptr: NativePtr) -> usize {
        self.with_state(|state| state.handles.mark_released(ptr))
            .unwrap_or(0)
    }

    fn report(&self, resource: &str, record: DiagnosticRecord) -> BridgeError {
        if self.config.diagnostics.log_script_errors {
            tracing::error!(target: "bridge.script", "{}: {}", resource, record);
        }
        self.diagnostics.record_diagnostic(&record, resource);
        BridgeError::Script(record)
    }
}

impl Drop for JsBridge {
    fn drop(&mut self) {
        instances().stop(self.instance);
    }
}
