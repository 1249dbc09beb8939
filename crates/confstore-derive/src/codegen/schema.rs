//! Schema code generation.
//!
//! Emits the slot and decoded companions of a schema, `impl Schema` and
//! `impl Convertible`. The slot struct mirrors the schema, except that
//! nested members hold child stores.

use super::{Member, Plan, Shape};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// Generate the companions and trait implementations for a schema.
pub fn generate(plan: &Plan<'_>) -> TokenStream {
    let ident = &plan.input.ident;
    let name = ident.to_string();
    let vis = &plan.input.vis;
    let notify = plan.input.notify;
    let store = &plan.store;
    let slots = &plan.slots;
    let decoded = &plan.decoded;

    let slot_fields = plan.fields.iter().map(|field| {
        let ident = field.ident();
        let ty = plan.slot_type(field);
        quote! { #ident: #ty }
    });

    let decoded_fields = plan.members.iter().map(|member| {
        let ident = member.ident();
        let ty = match &member.shape {
            Shape::Child(_) | Shape::OptionalChild(_) => quote! { ::confstore::Value },
            Shape::Value | Shape::Typed(_) => {
                let ty = member.ty();
                quote! { #ty }
            }
        };
        quote! { #ident: ::confstore::Decoded<#ty> }
    });

    let descriptors = plan.members.iter().map(Member::descriptor);
    let materialize = generate_materialize(plan);
    let snapshot = generate_snapshot(plan);
    let encode = plan.members.iter().map(|m| {
        let key = index(m);
        let expr = encode_slot(m);
        quote! { map.insert(#key.name(), #expr); }
    });
    let decode = plan.members.iter().map(decode_slot);
    let assign = plan.members.iter().map(assign_slot);
    let copy = plan.members.iter().map(copy_slot);
    let copied = plan.members.iter().map(|m| m.ident().to_string());
    let convertible = generate_convertible(plan);

    quote! {
        #[doc(hidden)]
        #[derive(Clone)]
        #vis struct #slots {
            #(#slot_fields,)*
        }

        #[doc(hidden)]
        #vis struct #decoded {
            #(#decoded_fields,)*
        }

        impl ::confstore::Schema for #ident {
            type Store = #store;
            type Slots = #slots;
            type Decoded = #decoded;

            const NAME: &'static str = #name;
            const NOTIFY: bool = #notify;

            fn read_members() -> ::std::vec::Vec<::confstore::MemberDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            #materialize

            #snapshot

            #[allow(unused_variables, unused_mut)]
            fn encode(
                slots: &#slots,
                members: &[::confstore::MemberDescriptor],
            ) -> ::confstore::Map {
                let mut map = ::confstore::Map::new();
                #(#encode)*
                map
            }

            #[allow(unused_variables)]
            fn decode(
                slots: &#slots,
                map: &::confstore::Map,
                members: &[::confstore::MemberDescriptor],
            ) -> #decoded {
                #decoded {
                    #(#decode,)*
                }
            }

            #[allow(unused_variables, unused_mut)]
            fn assign(
                slots: &mut #slots,
                decoded: #decoded,
                link: &::confstore::StoreLink,
            ) -> ::std::vec::Vec<&'static str> {
                let mut assigned = ::std::vec::Vec::new();
                #(#assign)*
                assigned
            }

            #[allow(unused_variables)]
            fn copy_into(
                slots: &mut #slots,
                source: &Self,
                link: &::confstore::StoreLink,
            ) -> ::std::vec::Vec<&'static str> {
                #(#copy)*
                ::std::vec![#(#copied),*]
            }
        }

        #convertible
    }
}

fn index(member: &Member<'_>) -> TokenStream {
    let i = member.index;
    quote! { members[#i] }
}

fn generate_materialize(plan: &Plan<'_>) -> TokenStream {
    let fields = plan.fields.iter().map(|field| {
        let ident = field.ident();
        match plan.member(field).map(|m| &m.shape) {
            Some(Shape::Child(schema)) => quote! {
                #ident: <<#schema as ::confstore::Schema>::Store as ::confstore::GeneratedStore>
                    ::from_value(value.#ident, ::core::option::Option::Some(link))
            },
            Some(Shape::OptionalChild(schema)) => quote! {
                #ident: value.#ident.map(|child| {
                    <<#schema as ::confstore::Schema>::Store as ::confstore::GeneratedStore>
                        ::from_value(child, ::core::option::Option::Some(link))
                })
            },
            _ => quote! { #ident: value.#ident },
        }
    });
    let slots = &plan.slots;
    quote! {
        #[allow(unused_variables)]
        fn materialize(value: Self, link: &::confstore::StoreLink) -> #slots {
            #slots {
                #(#fields,)*
            }
        }
    }
}

fn generate_snapshot(plan: &Plan<'_>) -> TokenStream {
    let fields = plan.fields.iter().map(|field| {
        let ident = field.ident();
        match plan.member(field).map(|m| &m.shape) {
            Some(Shape::Child(_)) => quote! {
                #ident: ::confstore::GeneratedStore::snapshot(&slots.#ident)
            },
            Some(Shape::OptionalChild(_)) => quote! {
                #ident: ::confstore::drivers::snapshot_optional_child(slots.#ident.as_ref())
            },
            _ => quote! { #ident: ::core::clone::Clone::clone(&slots.#ident) },
        }
    });
    let slots = &plan.slots;
    quote! {
        #[allow(unused_variables)]
        fn snapshot(slots: &#slots) -> Self {
            Self {
                #(#fields,)*
            }
        }
    }
}

fn encode_slot(member: &Member<'_>) -> TokenStream {
    let ident = member.ident();
    let ty = member.ty();
    let key = index(member);
    match &member.shape {
        Shape::Value => quote! {
            ::confstore::drivers::encode_value(<Self as ::confstore::Schema>::NAME, &slots.#ident, &#key)
        },
        Shape::Typed(conv) => quote! {
            ::confstore::drivers::encode_with::<#ty, #conv>(<Self as ::confstore::Schema>::NAME, &slots.#ident, &#key)
        },
        Shape::Child(_) => quote! {
            ::confstore::drivers::encode_child(&slots.#ident)
        },
        Shape::OptionalChild(_) => quote! {
            ::confstore::drivers::encode_optional_child(slots.#ident.as_ref())
        },
    }
}

fn decode_slot(member: &Member<'_>) -> TokenStream {
    let ident = member.ident();
    let ty = member.ty();
    let key = index(member);
    match &member.shape {
        Shape::Value => quote! {
            #ident: ::confstore::drivers::decode_value(<Self as ::confstore::Schema>::NAME, &slots.#ident, map, &#key)
        },
        Shape::Typed(conv) => quote! {
            #ident: ::confstore::drivers::decode_with::<#ty, #conv>(<Self as ::confstore::Schema>::NAME, map, &#key)
        },
        Shape::Child(_) | Shape::OptionalChild(_) => quote! {
            #ident: ::confstore::drivers::decode_nested(<Self as ::confstore::Schema>::NAME, map, &#key)
        },
    }
}

fn assign_slot(member: &Member<'_>) -> TokenStream {
    let ident = member.ident();
    let field = ident.to_string();
    match &member.shape {
        Shape::Value | Shape::Typed(_) => quote! {
            if let ::confstore::Decoded::Set(value) = decoded.#ident {
                slots.#ident = value;
                assigned.push(#field);
            }
        },
        Shape::Child(_) => quote! {
            if ::confstore::drivers::assign_child(&slots.#ident, decoded.#ident) {
                assigned.push(#field);
            }
        },
        Shape::OptionalChild(_) => quote! {
            if ::confstore::drivers::assign_optional_child(&mut slots.#ident, decoded.#ident, link) {
                assigned.push(#field);
            }
        },
    }
}

fn copy_slot(member: &Member<'_>) -> TokenStream {
    let ident = member.ident();
    match &member.shape {
        Shape::Value | Shape::Typed(_) => quote! {
            slots.#ident = ::core::clone::Clone::clone(&source.#ident);
        },
        Shape::Child(_) => quote! {
            ::confstore::drivers::copy_child(&slots.#ident, &source.#ident);
        },
        Shape::OptionalChild(_) => quote! {
            ::confstore::drivers::copy_optional_child(
                &mut slots.#ident,
                source.#ident.as_ref(),
                link,
            );
        },
    }
}

/// `Convertible` for the plain struct, so a schema can be embedded as a
/// whole value in another schema or collection.
///
/// Nested members are converted as plain values here.
fn generate_convertible(plan: &Plan<'_>) -> TokenStream {
    let ident = &plan.input.ident;

    let encode = plan.members.iter().map(|m| {
        let field = m.ident();
        let ty = m.ty();
        let key = index(m);
        let expr = match &m.shape {
            Shape::Typed(conv) => quote! {
                ::confstore::drivers::encode_with::<#ty, #conv>(<Self as ::confstore::Schema>::NAME, &self.#field, &#key)
            },
            _ => quote! {
                ::confstore::drivers::encode_value(<Self as ::confstore::Schema>::NAME, &self.#field, &#key)
            },
        };
        quote! { map.insert(#key.name(), #expr); }
    });

    let decode = plan.members.iter().map(|m| {
        let field = m.ident();
        let ty = m.ty();
        let key = index(m);
        let expr = match &m.shape {
            Shape::Typed(conv) => quote! {
                ::confstore::drivers::decode_with::<#ty, #conv>(<Self as ::confstore::Schema>::NAME, map, &#key)
            },
            _ => quote! {
                ::confstore::drivers::decode_value(<Self as ::confstore::Schema>::NAME, &self.#field, map, &#key)
            },
        };
        let value = format_ident!("__{}", field);
        quote! {
            if let ::confstore::Decoded::Set(#value) = #expr {
                self.#field = #value;
            }
        }
    });

    quote! {
        impl ::confstore::Convertible for #ident {
            #[allow(unused_variables, unused_mut)]
            fn to_value(&self) -> ::confstore::StoreResult<::confstore::Value> {
                let members = <Self as ::confstore::Schema>::members();
                let mut map = ::confstore::Map::new();
                #(#encode)*
                ::core::result::Result::Ok(::confstore::Value::Map(map))
            }

            fn from_value(value: &::confstore::Value) -> ::confstore::StoreResult<Self> {
                let mut out = <Self as ::core::default::Default>::default();
                ::confstore::Convertible::decode_into(&mut out, value)?;
                ::core::result::Result::Ok(out)
            }

            #[allow(unused_variables)]
            fn decode_into(&mut self, value: &::confstore::Value) -> ::confstore::StoreResult<()> {
                let map = value.as_map().ok_or_else(|| {
                    ::confstore::StoreError::type_mismatch(::confstore::ValueKind::Map, value.kind())
                })?;
                let members = <Self as ::confstore::Schema>::members();
                #(#decode)*
                ::core::result::Result::Ok(())
            }
        }
    }
}
