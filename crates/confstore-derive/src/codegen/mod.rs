//! Code generation for the Schema derive macro.

mod schema;
mod store;
mod utils;

use crate::field_kind::FieldKind;
use crate::parse::{FieldInput, SchemaInput};
use darling::FromDeriveInput;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{DeriveInput, Ident, Type};

/// How a serialized member is converted.
pub enum Shape {
    /// `Convertible`, or an untyped converter with `Convertible` fallback.
    Value,
    /// A typed `ValueConverter<FieldTy>`.
    Typed(Type),
    /// A child store of the given schema.
    Child(Type),
    /// An optional child store of the given schema.
    OptionalChild(Type),
}

/// One serialized member.
pub struct Member<'a> {
    pub field: &'a FieldInput,
    /// Position in the member table.
    pub index: usize,
    pub shape: Shape,
    pub is_option: bool,
}

impl Member<'_> {
    pub fn ident(&self) -> &Ident {
        self.field.ident()
    }

    pub fn ty(&self) -> &Type {
        &self.field.ty
    }

    /// The descriptor expression for this member.
    pub fn descriptor(&self) -> TokenStream {
        let ty = self.ty();
        let key = self.field.key();
        let field = self.ident().to_string();
        let declared = utils::type_display(ty);
        let is_option = self.is_option;
        let allow_null = self.is_option && !self.field.non_null;
        let intercepted = !self.field.plain;
        let nested = matches!(self.shape, Shape::Child(_) | Shape::OptionalChild(_));
        let converter = match (&self.shape, &self.field.dyn_converter) {
            (Shape::Typed(conv), _) => {
                quote! { .converter(::confstore::ConverterInfo::typed::<#conv>()) }
            }
            (_, Some(conv)) => {
                quote! { .converter(::confstore::ConverterInfo::untyped::<#conv>()) }
            }
            _ => quote! {},
        };
        quote! {
            ::confstore::MemberDescriptor::new::<#ty>(#key, #field, #declared)
                .nullable_wrapper(#is_option)
                .allow_null(#allow_null)
                .intercepted(#intercepted)
                .nested(#nested)
                #converter
        }
    }
}

/// Everything code generation needs about one schema.
pub struct Plan<'a> {
    pub input: &'a SchemaInput,
    pub store: Ident,
    pub slots: Ident,
    pub decoded: Ident,
    pub members: Vec<Member<'a>>,
    /// Every field in declaration order.
    pub fields: Vec<&'a FieldInput>,
}

impl Plan<'_> {
    /// Find the member for a field, if it is serialized.
    pub fn member(&self, field: &FieldInput) -> Option<&Member<'_>> {
        self.members.iter().find(|m| m.ident() == field.ident())
    }

    /// Slot type for a field.
    pub fn slot_type(&self, field: &FieldInput) -> TokenStream {
        match self.member(field).map(|m| &m.shape) {
            Some(Shape::Child(schema)) => {
                quote! { <#schema as ::confstore::Schema>::Store }
            }
            Some(Shape::OptionalChild(schema)) => {
                quote! { ::core::option::Option<<#schema as ::confstore::Schema>::Store> }
            }
            _ => {
                let ty = &field.ty;
                quote! { #ty }
            }
        }
    }
}

/// Main entry point for code generation.
pub fn expand(input: &DeriveInput) -> syn::Result<TokenStream> {
    let parsed = SchemaInput::from_derive_input(input)
        .map_err(|e| syn::Error::new_spanned(input, e.to_string()))?;

    if !parsed.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &parsed.generics,
            "#[derive(Schema)] does not support generic parameters. \
             Each schema is synthesized once for a concrete type.",
        ));
    }

    let fields = parsed.fields();
    let mut members = Vec::new();
    for field in &fields {
        validate_field(field)?;
        let kind = FieldKind::from_type(&field.ty, field.nested);
        if field.ignore || kind.is_delegate() {
            continue;
        }
        let shape = if let Some(conv) = &field.converter {
            Shape::Typed(conv.clone())
        } else if kind.is_nested() {
            Shape::Child(field.ty.clone())
        } else if kind.is_optional_nested() {
            Shape::OptionalChild(option_inner(&field.ty))
        } else {
            Shape::Value
        };
        members.push(Member {
            field,
            index: members.len(),
            shape,
            is_option: kind.is_option(),
        });
    }

    let ident = &parsed.ident;
    let plan = Plan {
        input: &parsed,
        store: format_ident!("{}Store", ident),
        slots: format_ident!("__{}Slots", ident),
        decoded: format_ident!("__{}Decoded", ident),
        members,
        fields,
    };

    let schema_impl = schema::generate(&plan);
    let store_impl = store::generate(&plan);
    Ok(quote! {
        #schema_impl
        #store_impl
    })
}

fn validate_field(field: &FieldInput) -> syn::Result<()> {
    if field.ignore && field.has_member_modifiers() {
        return Err(syn::Error::new_spanned(
            field.ident(),
            "#[confstore(ignore)] cannot be combined with other member modifiers. \
             Ignored members are never serialized.",
        ));
    }

    if field.converter.is_some() && field.dyn_converter.is_some() {
        return Err(syn::Error::new_spanned(
            field.ident(),
            "#[confstore(converter)] and #[confstore(dyn_converter)] cannot be used together.",
        ));
    }

    let kind = FieldKind::from_type(&field.ty, field.nested);
    if kind.is_delegate() && field.has_member_modifiers() {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "function-typed members are never serialized and take no member modifiers.",
        ));
    }

    if field.nested {
        if field.converter.is_some() || field.dyn_converter.is_some() {
            return Err(syn::Error::new_spanned(
                field.ident(),
                "#[confstore(nested)] members are converted by their own schema \
                 and cannot use a converter.",
            ));
        }
        if !kind.is_nested() && !kind.is_optional_nested() {
            return Err(syn::Error::new_spanned(
                &field.ty,
                "#[confstore(nested)] supports a schema type `T` or `Option<T>`.",
            ));
        }
    }

    Ok(())
}

/// Extract `T` from `Option<T>`.
fn option_inner(ty: &Type) -> Type {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if let syn::PathArguments::AngleBracketed(ab) = &segment.arguments {
                if let Some(syn::GenericArgument::Type(inner)) = ab.args.first() {
                    return inner.clone();
                }
            }
        }
    }
    ty.clone()
}
