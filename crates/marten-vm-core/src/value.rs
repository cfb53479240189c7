//! Script values

use std::fmt;
use std::sync::Arc;

use marten_vm_bytecode::Module;

use crate::context::VmContext;
use crate::error::VmResult;
use crate::object::JsObject;

/// Signature of a Rust-implemented function callable from bytecode
pub type NativeFn = fn(&mut VmContext, &[Value]) -> VmResult<Value>;

/// A script value
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// 64-bit float
    Number(f64),
    /// Immutable string
    String(Arc<str>),
    /// Bytecode closure
    Function(Closure),
    /// Rust-implemented function
    Native(NativeFunction),
    /// Property bag
    Object(Arc<JsObject>),
}

/// A bytecode function bound to its defining module
#[derive(Clone)]
pub struct Closure {
    /// Index into the module's function table
    pub function_index: u32,
    /// Defining module
    pub module: Arc<Module>,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("function_index", &self.function_index)
            .field("module", &self.module.source_url)
            .finish()
    }
}

impl Closure {
    /// Name of the underlying function (or the anonymous placeholder)
    pub fn display_name(&self) -> &str {
        self.module
            .function(self.function_index)
            .map(|f| f.display_name())
            .unwrap_or(marten_vm_bytecode::function::ANONYMOUS_FUNCTION_NAME)
    }
}

/// A named Rust function
#[derive(Clone, Copy)]
pub struct NativeFunction {
    /// Name reported in stack frames
    pub name: &'static str,
    /// Implementation
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

impl Value {
    /// Create `undefined`
    #[inline]
    pub fn undefined() -> Self {
        Self::Undefined
    }

    /// Create a number
    #[inline]
    pub fn number(n: f64) -> Self {
        Self::Number(n)
    }

    /// Create a string
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Self::String(s.into())
    }

    /// Wrap a native function
    #[inline]
    pub fn native(name: &'static str, func: NativeFn) -> Self {
        Self::Native(NativeFunction { name, func })
    }

    /// Wrap an object
    #[inline]
    pub fn object(object: Arc<JsObject>) -> Self {
        Self::Object(object)
    }

    /// Check for `undefined`
    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&Arc<JsObject>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Name of the value's type, as used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) | Self::Native(_) => "function",
            Self::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Number(n) => format_number(*n, f),
            Self::String(s) => write!(f, "{}", s),
            Self::Function(closure) => {
                write!(f, "function {}() {{ [bytecode] }}", closure.display_name())
            }
            Self::Native(native) => write!(f, "function {}() {{ [native code] }}", native.name),
            Self::Object(_) => write!(f, "[object Object]"),
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}Infinity", if n < 0.0 { "-" } else { "" })
    } else if n == n.trunc() && n.abs() < 1e21 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}
