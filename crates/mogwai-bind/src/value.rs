//! Dynamically typed scalar values used by bindings.
use crate::str::Str;

/// A scalar that can be written into the DOM.
///
/// Bindings decide what to do with a value based on its "truthiness", which follows
/// the same rules a browser script would: [`Value::Null`], `false`, `0`, `NaN` and the
/// empty string are falsy, everything else is truthy.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(Str),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// The text a node would display for this value.
    ///
    /// [`Value::Null`] is the empty string. Integral numbers are written without a
    /// fractional part.
    pub fn to_text(&self) -> Str {
        match self {
            Value::Null => Str::Borrowed(""),
            Value::Bool(true) => Str::Borrowed("true"),
            Value::Bool(false) => Str::Borrowed("false"),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    Str::Owned(format!("{}", *n as i64))
                } else if n.is_nan() {
                    Str::Borrowed("NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        Str::Borrowed("Infinity")
                    } else {
                        Str::Borrowed("-Infinity")
                    }
                } else {
                    Str::Owned(format!("{n}"))
                }
            }
            Value::Text(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::Text(Str::Borrowed(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(Str::Owned(s))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(Str::Owned(s.clone()))
    }
}

impl From<Str> for Value {
    fn from(s: Str) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

macro_rules! number_impl {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

number_impl!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(may_t: Option<T>) -> Self {
        may_t.map(Into::into).unwrap_or(Value::Null)
    }
}
