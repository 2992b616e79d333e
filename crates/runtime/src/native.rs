//! Built-in native functions exposed to every running program.

use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use lox_core::{Heap, Interner, Obj, ObjNative, Value};

/// Registers the native function set into `globals`, interning each
/// name through `interner` exactly as a user-defined global would be.
pub fn install(
    globals: &mut lox_core::Table,
    interner: &mut Interner,
    heap: &mut Heap,
) {
    define(globals, interner, heap, "clock", 0, |_args| {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| e.to_string())?;
        Ok(Value::Number(elapsed.as_secs_f64()))
    });
}

fn define(
    globals: &mut lox_core::Table,
    interner: &mut Interner,
    heap: &mut Heap,
    name: &str,
    arity: u8,
    func: impl Fn(&[Value]) -> Result<Value, String> + 'static,
) {
    let interned_name = interner.copy_string(heap, name);
    let native = Rc::new(ObjNative {
        name: interned_name.clone(),
        arity,
        func: Box::new(func),
    });
    heap.track(Obj::Native(native.clone()));
    globals.set(interned_name, Value::Obj(Obj::Native(native)));
}
