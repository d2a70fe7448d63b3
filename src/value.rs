//! Narrowing of wire values into concrete Rust types.
//!
//! Everything crosses the wire as [`rmpv::Value`]. Typed call sites narrow
//! results with [`FromValue`], which fails with `RpcError::TypeMismatch`
//! when the shape is wrong.

use rmpv::Value;

use crate::rpc::RpcError;

/// Conversion from a wire value, failing on a shape mismatch.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, RpcError>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        Ok(value)
    }
}

/// Calls whose result is ignored accept anything, including nil.
impl FromValue for () {
    fn from_value(_value: Value) -> Result<Self, RpcError> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        value
            .as_bool()
            .ok_or_else(|| RpcError::type_mismatch("boolean", &value))
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        value
            .as_i64()
            .ok_or_else(|| RpcError::type_mismatch("integer", &value))
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::String(s) => match s.into_str() {
                Some(s) => Ok(s),
                None => Err(RpcError::TypeMismatch {
                    expected: "UTF-8 string",
                    found: "invalid UTF-8".to_string(),
                }),
            },
            // Older engines send text as raw bytes.
            Value::Binary(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            other => Err(RpcError::type_mismatch("string", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(RpcError::type_mismatch("array", &other)),
        }
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Array(items) if items.len() == 2 => {
                let mut items = items.into_iter();
                let (Some(a), Some(b)) = (items.next(), items.next()) else {
                    return Err(RpcError::TypeMismatch {
                        expected: "2-element array",
                        found: "short array".to_string(),
                    });
                };
                Ok((A::from_value(a)?, B::from_value(b)?))
            }
            other => Err(RpcError::type_mismatch("2-element array", &other)),
        }
    }
}

/// Read an extension payload as a little-endian integer, zero-padding
/// payloads shorter than eight bytes.
pub fn ext_to_i64(payload: &[u8]) -> Option<i64> {
    if payload.len() > 8 {
        return None;
    }
    let mut bytes = [0u8; 8];
    bytes[..payload.len()].copy_from_slice(payload);
    Some(i64::from_le_bytes(bytes))
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $ext:expr, $label:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub i64);

        impl $name {
            /// Extension type tag used on the wire.
            pub const EXT_TYPE: i8 = $ext;

            /// The wire form of this handle as a typed extension value.
            pub fn to_ext(self) -> Value {
                Value::Ext(Self::EXT_TYPE, self.0.to_le_bytes().to_vec())
            }
        }

        impl FromValue for $name {
            fn from_value(value: Value) -> Result<Self, RpcError> {
                match &value {
                    Value::Ext(tag, payload) if *tag == Self::EXT_TYPE => ext_to_i64(payload)
                        .map($name)
                        .ok_or_else(|| RpcError::type_mismatch($label, &value)),
                    Value::Integer(_) => value
                        .as_i64()
                        .map($name)
                        .ok_or_else(|| RpcError::type_mismatch($label, &value)),
                    _ => Err(RpcError::type_mismatch($label, &value)),
                }
            }
        }

        /// Handles go out as plain integers, which the engine accepts for
        /// every handle parameter.
        impl From<$name> for Value {
            fn from(handle: $name) -> Self {
                Value::from(handle.0)
            }
        }
    };
}

handle_type!(
    /// Reference to an editor buffer.
    Buffer,
    0,
    "buffer handle"
);
handle_type!(
    /// Reference to an editor window.
    Window,
    1,
    "window handle"
);
handle_type!(
    /// Reference to an editor tab page.
    Tabpage,
    2,
    "tabpage handle"
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_narrowing() {
        assert_eq!(i64::from_value(Value::from(-3)).unwrap(), -3);
        assert!(bool::from_value(Value::from(true)).unwrap());
        assert_eq!(String::from_value(Value::from("abc")).unwrap(), "abc");
        assert_eq!(
            String::from_value(Value::Binary(b"raw".to_vec())).unwrap(),
            "raw"
        );
    }

    #[test]
    fn test_narrowing_mismatch() {
        assert!(matches!(
            i64::from_value(Value::from("12")),
            Err(RpcError::TypeMismatch { expected: "integer", .. })
        ));
        assert!(matches!(
            Vec::<i64>::from_value(Value::Array(vec![Value::from(1), Value::Nil])),
            Err(RpcError::TypeMismatch { .. })
        ));
        assert!(matches!(
            <(i64, i64)>::from_value(Value::Array(vec![Value::from(1)])),
            Err(RpcError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_pair_and_list() {
        let cursor = <(i64, i64)>::from_value(Value::Array(vec![Value::from(4), Value::from(7)]));
        assert_eq!(cursor.unwrap(), (4, 7));

        let lines = Vec::<String>::from_value(Value::Array(vec![
            Value::from("one"),
            Value::from("two"),
        ]))
        .unwrap();
        assert_eq!(lines, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn test_ext_to_i64_pads_short_payloads() {
        assert_eq!(ext_to_i64(&[1]), Some(1));
        assert_eq!(ext_to_i64(&[0x00, 0x01]), Some(256));
        assert_eq!(ext_to_i64(&7i64.to_le_bytes()), Some(7));
        assert_eq!(ext_to_i64(&[0; 9]), None);
    }

    #[test]
    fn test_handles_from_ext_and_integer() {
        let buffer = Buffer::from_value(Value::Ext(0, 5i64.to_le_bytes().to_vec())).unwrap();
        assert_eq!(buffer, Buffer(5));

        let window = Window::from_value(Value::from(1000)).unwrap();
        assert_eq!(window, Window(1000));

        // A window extension is not a buffer.
        assert!(Buffer::from_value(Value::Ext(1, vec![1])).is_err());
        assert_eq!(Tabpage(3).to_ext(), Value::Ext(2, 3i64.to_le_bytes().to_vec()));
        assert_eq!(Value::from(Buffer(2)), Value::from(2));
    }
}
