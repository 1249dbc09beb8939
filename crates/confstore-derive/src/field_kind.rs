//! Field type analysis for code generation.

use syn::{GenericArgument, PathArguments, Type, TypeParamBound, TypePath};

/// The kind of a field, determining how its store slot is generated.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A value converted as a whole (primitives, collections, embedded schemas).
    Value,

    /// An `Option<T>` type.
    Option(Box<FieldKind>),

    /// A schema held as a child store.
    Nested,

    /// A function pointer or closure. Never serialized.
    Delegate,
}

impl FieldKind {
    /// Analyze a type and determine its kind.
    ///
    /// The `is_nested_attr` flag marks the **leaf type** as nested, while an
    /// `Option` wrapper is preserved:
    /// - `Option<Audio>` with `nested=true` → `Option(Nested)`
    /// - `Audio` with `nested=true` → `Nested`
    pub fn from_type(ty: &Type, is_nested_attr: bool) -> Self {
        match ty {
            Type::BareFn(_) => FieldKind::Delegate,
            Type::TraitObject(obj) if obj.bounds.iter().any(is_fn_bound) => FieldKind::Delegate,
            Type::Group(group) => Self::from_type(&group.elem, is_nested_attr),
            Type::Paren(paren) => Self::from_type(&paren.elem, is_nested_attr),
            Type::Path(type_path) => Self::from_type_path(type_path, is_nested_attr),
            _ => FieldKind::Value,
        }
    }

    fn from_type_path(type_path: &TypePath, is_nested_attr: bool) -> Self {
        let Some(segment) = type_path.path.segments.last() else {
            return FieldKind::Value;
        };
        match segment.ident.to_string().as_str() {
            "Option" => match extract_single_generic_arg(&segment.arguments) {
                Some(inner) => FieldKind::Option(Box::new(Self::from_type(inner, is_nested_attr))),
                None => FieldKind::Value,
            },
            // Boxed or shared closures
            "Box" | "Arc" | "Rc" => match extract_single_generic_arg(&segment.arguments) {
                Some(inner) if Self::from_type(inner, false).is_delegate() => FieldKind::Delegate,
                _ => FieldKind::Value,
            },
            _ if is_nested_attr => FieldKind::Nested,
            _ => FieldKind::Value,
        }
    }

    /// Check if this is an Option type.
    pub fn is_option(&self) -> bool {
        matches!(self, FieldKind::Option(_))
    }

    /// Check if this is a nested type.
    pub fn is_nested(&self) -> bool {
        matches!(self, FieldKind::Nested)
    }

    /// Check if this is an optional nested type.
    pub fn is_optional_nested(&self) -> bool {
        matches!(self, FieldKind::Option(inner) if inner.is_nested())
    }

    /// Check if this is a delegate type.
    pub fn is_delegate(&self) -> bool {
        match self {
            FieldKind::Delegate => true,
            FieldKind::Option(inner) => inner.is_delegate(),
            _ => false,
        }
    }
}

fn is_fn_bound(bound: &TypeParamBound) -> bool {
    match bound {
        TypeParamBound::Trait(t) => t
            .path
            .segments
            .last()
            .map(|s| matches!(s.ident.to_string().as_str(), "Fn" | "FnMut" | "FnOnce"))
            .unwrap_or(false),
        _ => false,
    }
}

/// Extract a single generic type argument from path arguments.
fn extract_single_generic_arg(args: &PathArguments) -> Option<&Type> {
    match args {
        PathArguments::AngleBracketed(ab) => {
            if ab.args.len() == 1 {
                if let GenericArgument::Type(ty) = ab.args.first()? {
                    return Some(ty);
                }
            }
            None
        }
        _ => None,
    }
}
