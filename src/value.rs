use crate::array::{ArrayView, DataBlock};
use crate::error::{MapError, Result};
use num_complex::Complex64;
use std::fmt;

mod sealed {
    pub trait Sealed {}
}

/// Element types an [`ArrayView`] or [`DataBlock`] can hold inside a map.
///
/// The set is closed: `bool`, `i64`, `f64`, `String` and `Complex64`.
pub trait Element: sealed::Sealed + Clone + PartialEq + fmt::Debug + 'static {
    /// Name of `ArrayView<Self>`
    const VIEW_NAME: &'static str;
    /// Name of `DataBlock<Self>`
    const BLOCK_NAME: &'static str;

    #[doc(hidden)]
    fn wrap_view(view: ArrayView<Self>) -> Value;
    #[doc(hidden)]
    fn view_ref(value: &Value) -> Option<&ArrayView<Self>>;
    #[doc(hidden)]
    fn view_mut(value: &mut Value) -> Option<&mut ArrayView<Self>>;
    #[doc(hidden)]
    fn wrap_block(block: DataBlock<Self>) -> Value;
    #[doc(hidden)]
    fn block_ref(value: &Value) -> Option<&DataBlock<Self>>;
    #[doc(hidden)]
    fn block_mut(value: &mut Value) -> Option<&mut DataBlock<Self>>;
}

/// Types that can be stored in a [`Value`] and read back by type.
///
/// Implemented for `bool`, `i64`, `f64`, `String`, `Complex64` and for
/// `ArrayView<E>` and `DataBlock<E>` of every [`Element`] `E`. Nothing else
/// can be stored; in particular unsigned integers are rejected at compile time.
pub trait Supported: sealed::Sealed + Sized + 'static {
    /// Human-readable name of the type
    const TYPE_NAME: &'static str;

    fn into_value(self) -> Value;

    #[doc(hidden)]
    fn from_ref(value: &Value) -> Option<&Self>;
    #[doc(hidden)]
    fn from_mut(value: &mut Value) -> Option<&mut Self>;
}

/// A single value of one of the supported types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Complex(Complex64),
    BoolView(ArrayView<bool>),
    IntegerView(ArrayView<i64>),
    FloatView(ArrayView<f64>),
    StringView(ArrayView<String>),
    ComplexView(ArrayView<Complex64>),
    BoolBlock(DataBlock<bool>),
    IntegerBlock(DataBlock<i64>),
    FloatBlock(DataBlock<f64>),
    StringBlock(DataBlock<String>),
    ComplexBlock(DataBlock<Complex64>),
}

impl Value {
    /// Name of the type currently held
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => bool::TYPE_NAME,
            Value::Integer(_) => i64::TYPE_NAME,
            Value::Float(_) => f64::TYPE_NAME,
            Value::String(_) => String::TYPE_NAME,
            Value::Complex(_) => Complex64::TYPE_NAME,
            Value::BoolView(_) => bool::VIEW_NAME,
            Value::IntegerView(_) => i64::VIEW_NAME,
            Value::FloatView(_) => f64::VIEW_NAME,
            Value::StringView(_) => String::VIEW_NAME,
            Value::ComplexView(_) => Complex64::VIEW_NAME,
            Value::BoolBlock(_) => bool::BLOCK_NAME,
            Value::IntegerBlock(_) => i64::BLOCK_NAME,
            Value::FloatBlock(_) => f64::BLOCK_NAME,
            Value::StringBlock(_) => String::BLOCK_NAME,
            Value::ComplexBlock(_) => Complex64::BLOCK_NAME,
        }
    }

    /// Check if the held value is of type T
    pub fn is_type<T: Supported>(&self) -> bool {
        T::from_ref(self).is_some()
    }

    /// Reference to the held value if it is of type T.
    ///
    /// # Errors
    ///
    /// Returns `MapError::TypeMismatch` naming both types otherwise.
    pub fn get<T: Supported>(&self) -> Result<&T> {
        T::from_ref(self).ok_or_else(|| mismatch::<T>(self.type_name()))
    }

    /// Mutable reference to the held value if it is of type T.
    ///
    /// # Errors
    ///
    /// Returns `MapError::TypeMismatch` naming both types otherwise.
    pub fn get_mut<T: Supported>(&mut self) -> Result<&mut T> {
        let actual = self.type_name();
        T::from_mut(self).ok_or_else(|| mismatch::<T>(actual))
    }

    /// Replaces value and type.
    pub fn set(&mut self, value: impl Into<Value>) {
        *self = value.into();
    }
}

fn mismatch<T: Supported>(actual: &'static str) -> MapError {
    MapError::TypeMismatch {
        requested: T::TYPE_NAME,
        actual,
    }
}

/// Holder for at most one [`Value`]. Entries of a map are cells that always
/// hold a value; a default cell is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueCell {
    value: Option<Value>,
}

impl ValueCell {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Name of the held type, `"<empty>"` for an empty cell
    pub fn type_name(&self) -> &'static str {
        self.value.as_ref().map_or("<empty>", Value::type_name)
    }

    /// Replaces both value and type.
    pub fn set(&mut self, value: impl Into<Value>) {
        self.value = Some(value.into());
    }

    /// # Errors
    ///
    /// Returns `MapError::TypeMismatch` if the cell is empty or holds another type.
    pub fn get<T: Supported>(&self) -> Result<&T> {
        match &self.value {
            Some(value) => value.get(),
            None => Err(mismatch::<T>(self.type_name())),
        }
    }

    /// # Errors
    ///
    /// Returns `MapError::TypeMismatch` if the cell is empty or holds another type.
    pub fn get_mut<T: Supported>(&mut self) -> Result<&mut T> {
        match &mut self.value {
            Some(value) => value.get_mut(),
            None => Err(mismatch::<T>("<empty>")),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }
}

impl From<Value> for ValueCell {
    fn from(value: Value) -> Self {
        Self { value: Some(value) }
    }
}

macro_rules! supported_scalar {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl sealed::Sealed for $ty {}

        impl Supported for $ty {
            const TYPE_NAME: &'static str = $name;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_ref(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn from_mut(value: &mut Value) -> Option<&mut Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

macro_rules! supported_element {
    ($ty:ty, $view:ident, $block:ident, $view_name:literal, $block_name:literal) => {
        impl Element for $ty {
            const VIEW_NAME: &'static str = $view_name;
            const BLOCK_NAME: &'static str = $block_name;

            fn wrap_view(view: ArrayView<Self>) -> Value {
                Value::$view(view)
            }

            fn view_ref(value: &Value) -> Option<&ArrayView<Self>> {
                match value {
                    Value::$view(v) => Some(v),
                    _ => None,
                }
            }

            fn view_mut(value: &mut Value) -> Option<&mut ArrayView<Self>> {
                match value {
                    Value::$view(v) => Some(v),
                    _ => None,
                }
            }

            fn wrap_block(block: DataBlock<Self>) -> Value {
                Value::$block(block)
            }

            fn block_ref(value: &Value) -> Option<&DataBlock<Self>> {
                match value {
                    Value::$block(b) => Some(b),
                    _ => None,
                }
            }

            fn block_mut(value: &mut Value) -> Option<&mut DataBlock<Self>> {
                match value {
                    Value::$block(b) => Some(b),
                    _ => None,
                }
            }
        }
    };
}

supported_scalar!(bool, Bool, "bool");
supported_scalar!(i64, Integer, "i64");
supported_scalar!(f64, Float, "f64");
supported_scalar!(String, String, "String");
supported_scalar!(Complex64, Complex, "Complex64");

supported_element!(bool, BoolView, BoolBlock, "ArrayView<bool>", "DataBlock<bool>");
supported_element!(i64, IntegerView, IntegerBlock, "ArrayView<i64>", "DataBlock<i64>");
supported_element!(f64, FloatView, FloatBlock, "ArrayView<f64>", "DataBlock<f64>");
supported_element!(String, StringView, StringBlock, "ArrayView<String>", "DataBlock<String>");
supported_element!(
    Complex64,
    ComplexView,
    ComplexBlock,
    "ArrayView<Complex64>",
    "DataBlock<Complex64>"
);

impl<E: Element> sealed::Sealed for ArrayView<E> {}

impl<E: Element> Supported for ArrayView<E> {
    const TYPE_NAME: &'static str = E::VIEW_NAME;

    fn into_value(self) -> Value {
        E::wrap_view(self)
    }

    fn from_ref(value: &Value) -> Option<&Self> {
        E::view_ref(value)
    }

    fn from_mut(value: &mut Value) -> Option<&mut Self> {
        E::view_mut(value)
    }
}

impl<E: Element> From<ArrayView<E>> for Value {
    fn from(view: ArrayView<E>) -> Self {
        E::wrap_view(view)
    }
}

impl<E: Element> sealed::Sealed for DataBlock<E> {}

impl<E: Element> Supported for DataBlock<E> {
    const TYPE_NAME: &'static str = E::BLOCK_NAME;

    fn into_value(self) -> Value {
        E::wrap_block(self)
    }

    fn from_ref(value: &Value) -> Option<&Self> {
        E::block_ref(value)
    }

    fn from_mut(value: &mut Value) -> Option<&mut Self> {
        E::block_mut(value)
    }
}

impl<E: Element> From<DataBlock<E>> for Value {
    fn from(block: DataBlock<E>) -> Self {
        E::wrap_block(block)
    }
}

// Plain integer and float literals widen to the stored 64-bit types.
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
