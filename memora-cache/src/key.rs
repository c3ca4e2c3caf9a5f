//! Cache key construction.
//!
//! A key identifies one call: the method's static overload identity (declaring
//! type, name, generic arguments, parameter names and types) plus the
//! serialized argument values. Each argument is written as `{len}:{json}` so
//! neighbouring values cannot run together. The whole concatenation is hashed
//! with MD5 and the final key reads `{declaring_type}.{method_name}({hash})`.

use serde::Serialize;
use std::any::type_name;
use std::borrow::Borrow;
use std::fmt;
use tracing::{debug, warn};

/// Name and type identifier of one method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterDescriptor {
    /// Parameter name
    pub name: String,
    /// Type identifier
    pub type_name: String,
}

/// Static identity of an intercepted method.
///
/// # Examples
///
/// ```
/// use memora_cache::MethodDescriptor;
///
/// let descriptor = MethodDescriptor::new("shop::ProductService", "find")
///     .with_param_of::<u64>("id")
///     .with_param_of::<bool>("include_stock");
///
/// assert_eq!(descriptor.parameters().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    declaring_type: String,
    method_name: String,
    generic_arguments: Vec<String>,
    parameters: Vec<ParameterDescriptor>,
}

impl MethodDescriptor {
    /// Create a descriptor from a declaring type identifier and a method name.
    pub fn new(declaring_type: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method_name: method_name.into(),
            generic_arguments: Vec::new(),
            parameters: Vec::new(),
        }
    }

    /// Create a descriptor whose declaring type is `S`.
    pub fn of<S: ?Sized>(method_name: impl Into<String>) -> Self {
        Self::new(type_name::<S>(), method_name)
    }

    /// Append a generic type argument identifier.
    pub fn with_generic(mut self, type_id: impl Into<String>) -> Self {
        self.generic_arguments.push(type_id.into());
        self
    }

    /// Append `T` as a generic type argument.
    pub fn with_generic_of<T: ?Sized>(self) -> Self {
        self.with_generic(type_name::<T>())
    }

    /// Append a parameter.
    pub fn with_param(mut self, name: impl Into<String>, type_id: impl Into<String>) -> Self {
        self.parameters.push(ParameterDescriptor {
            name: name.into(),
            type_name: type_id.into(),
        });
        self
    }

    /// Append a parameter of type `T`.
    pub fn with_param_of<T: ?Sized>(self, name: impl Into<String>) -> Self {
        self.with_param(name, type_name::<T>())
    }

    /// Declaring type identifier.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Method name.
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Generic type argument identifiers, in declaration order.
    pub fn generic_arguments(&self) -> &[String] {
        &self.generic_arguments
    }

    /// Parameters, in declaration order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    fn write_signature(&self, out: &mut String) {
        out.push_str(&self.declaring_type);
        out.push_str(&self.method_name);
        for generic in &self.generic_arguments {
            out.push_str(generic);
        }
        for parameter in &self.parameters {
            out.push_str(&parameter.name);
            out.push_str(&parameter.type_name);
        }
    }
}

/// Argument values of one invocation, serialized in call order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationArguments {
    values: Vec<String>,
}

impl InvocationArguments {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument value.
    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) {
        self.values.push(canonical_json(value));
    }

    /// Append an argument that is absent.
    pub fn push_absent(&mut self) {
        self.values.push(String::new());
    }

    /// Builder form of [`push`](Self::push).
    pub fn with<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.push(value);
        self
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialized contributions, in call order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

/// Canonical text of an argument value.
///
/// Values go through [`serde_json::Value`] first, so maps come out with
/// sorted keys regardless of their in-memory iteration order. `null` and
/// values that fail to serialize contribute an empty string.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Null) => String::new(),
        Ok(json) => json.to_string(),
        Err(e) => {
            debug!(
                target: "memora::cache",
                error = %e,
                type_name = type_name::<T>(),
                "argument not serializable, using empty key contribution"
            );
            String::new()
        }
    }
}

/// A cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an explicit key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Builds cache keys from a method descriptor and its arguments.
pub struct KeyBuilder;

impl KeyBuilder {
    /// Build the key for one invocation.
    ///
    /// # Examples
    ///
    /// ```
    /// use memora_cache::{InvocationArguments, KeyBuilder, MethodDescriptor};
    ///
    /// let descriptor = MethodDescriptor::new("shop::ProductService", "find")
    ///     .with_param_of::<u64>("id");
    /// let key = KeyBuilder::build(&descriptor, &InvocationArguments::new().with(&42u64));
    ///
    /// assert!(key.as_str().starts_with("shop::ProductService.find("));
    /// ```
    pub fn build(descriptor: &MethodDescriptor, arguments: &InvocationArguments) -> CacheKey {
        if arguments.len() != descriptor.parameters.len() {
            warn!(
                target: "memora::cache",
                method = %descriptor.method_name,
                parameters = descriptor.parameters.len(),
                arguments = arguments.len(),
                "argument count does not match parameter count"
            );
        }

        let mut material = String::new();
        descriptor.write_signature(&mut material);
        for argument in arguments.iter() {
            material.push_str(&argument.len().to_string());
            material.push(':');
            material.push_str(argument);
        }

        let hash = format!("{:x}", md5::compute(material.as_bytes()));

        CacheKey(format!(
            "{}.{}({})",
            descriptor.declaring_type, descriptor.method_name, hash
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Filter {
        category: String,
        max_price: u32,
    }

    struct Opaque;

    impl Serialize for Opaque {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not serializable"))
        }
    }

    fn find_product() -> MethodDescriptor {
        MethodDescriptor::new("shop::ProductService", "find")
            .with_param_of::<String>("name")
            .with_param_of::<u32>("page")
    }

    fn hash_of(key: &CacheKey) -> &str {
        let open = key.as_str().rfind('(').unwrap();
        &key.as_str()[open + 1..key.as_str().len() - 1]
    }

    #[test]
    fn test_key_format() {
        let args = InvocationArguments::new().with("apple").with(&1u32);
        let key = KeyBuilder::build(&find_product(), &args);

        assert!(key.as_str().starts_with("shop::ProductService.find("));
        assert!(key.as_str().ends_with(')'));

        let hash = hash_of(&key);
        assert_eq!(hash.len(), 32);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_digest() {
        let descriptor = MethodDescriptor::new("T", "m");
        let key = KeyBuilder::build(&descriptor, &InvocationArguments::new());

        // md5("Tm")
        let expected = format!("{:x}", md5::compute(b"Tm"));
        assert_eq!(key.as_str(), format!("T.m({})", expected));
    }

    #[test]
    fn test_deterministic() {
        let a = InvocationArguments::new().with("apple").with(&1u32);
        let b = InvocationArguments::new().with("apple").with(&1u32);

        assert_eq!(
            KeyBuilder::build(&find_product(), &a),
            KeyBuilder::build(&find_product(), &b)
        );
    }

    #[test]
    fn test_argument_value_changes_key() {
        let apple = InvocationArguments::new().with("apple").with(&1u32);
        let orange = InvocationArguments::new().with("orange").with(&1u32);
        let page_two = InvocationArguments::new().with("apple").with(&2u32);

        let k1 = KeyBuilder::build(&find_product(), &apple);
        let k2 = KeyBuilder::build(&find_product(), &orange);
        let k3 = KeyBuilder::build(&find_product(), &page_two);

        assert_ne!(k1, k2);
        assert_ne!(k1, k3);
        assert_ne!(k2, k3);
    }

    #[test]
    fn test_argument_boundaries_change_key() {
        let descriptor = MethodDescriptor::new("svc", "pair")
            .with_param_of::<u32>("a")
            .with_param_of::<u32>("b");

        let twelve_three = InvocationArguments::new().with(&12u32).with(&3u32);
        let one_twenty_three = InvocationArguments::new().with(&1u32).with(&23u32);

        assert_ne!(
            KeyBuilder::build(&descriptor, &twelve_three),
            KeyBuilder::build(&descriptor, &one_twenty_three)
        );

        let split = InvocationArguments::new().with("ab").with("c");
        let joined = InvocationArguments::new().with("a").with("bc");
        assert_ne!(
            KeyBuilder::build(&descriptor, &split),
            KeyBuilder::build(&descriptor, &joined)
        );
    }

    #[test]
    fn test_parameter_type_changes_key() {
        let args = InvocationArguments::new().with(&7u32);

        let by_u32 = MethodDescriptor::new("svc", "get").with_param_of::<u32>("id");
        let by_u64 = MethodDescriptor::new("svc", "get").with_param_of::<u64>("id");

        assert_ne!(
            KeyBuilder::build(&by_u32, &args),
            KeyBuilder::build(&by_u64, &args)
        );
    }

    #[test]
    fn test_generic_argument_changes_key() {
        let args = InvocationArguments::new().with("x");

        let as_string = MethodDescriptor::new("svc", "load")
            .with_generic_of::<String>()
            .with_param_of::<&str>("id");
        let as_bytes = MethodDescriptor::new("svc", "load")
            .with_generic_of::<Vec<u8>>()
            .with_param_of::<&str>("id");

        assert_ne!(
            KeyBuilder::build(&as_string, &args),
            KeyBuilder::build(&as_bytes, &args)
        );
    }

    #[test]
    fn test_overloads_do_not_collide() {
        let no_args = MethodDescriptor::new("svc", "list");
        let with_page = MethodDescriptor::new("svc", "list").with_param_of::<u32>("page");

        let k1 = KeyBuilder::build(&no_args, &InvocationArguments::new());
        let k2 = KeyBuilder::build(&with_page, &InvocationArguments::new().with(&0u32));
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_absent_argument_contributes_empty_text() {
        let none: Option<u32> = None;

        let mut args = InvocationArguments::new();
        args.push(&none);
        args.push(&());
        args.push_absent();

        assert_eq!(args.iter().collect::<Vec<_>>(), vec!["", "", ""]);
    }

    #[test]
    fn test_unserializable_argument_does_not_fail() {
        let descriptor = MethodDescriptor::new("svc", "run").with_param("handle", "Opaque");
        let args = InvocationArguments::new().with(&Opaque);

        assert_eq!(args.iter().next(), Some(""));
        let key = KeyBuilder::build(&descriptor, &args);
        assert!(key.as_str().starts_with("svc.run("));
    }

    #[test]
    fn test_struct_argument_serializes_as_json() {
        let filter = Filter {
            category: "fruit".to_string(),
            max_price: 10,
        };

        assert_eq!(
            canonical_json(&filter),
            r#"{"category":"fruit","max_price":10}"#
        );
    }

    #[test]
    fn test_map_argument_is_order_independent() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for i in 0..32 {
            first.insert(format!("k{}", i), i);
        }
        for i in (0..32).rev() {
            second.insert(format!("k{}", i), i);
        }

        assert_eq!(canonical_json(&first), canonical_json(&second));
    }

    #[test]
    fn test_descriptor_of_self_type() {
        let descriptor = MethodDescriptor::of::<Filter>("matches");
        assert!(descriptor.declaring_type().ends_with("Filter"));
        assert_eq!(descriptor.method_name(), "matches");
    }

    #[test]
    fn test_explicit_key_conversions() {
        let key = CacheKey::from("user:1");
        assert_eq!(key.to_string(), "user:1");
        assert_eq!(key.clone().into_string(), "user:1");
        assert_eq!(CacheKey::new(String::from("user:1")), key);
    }
}
