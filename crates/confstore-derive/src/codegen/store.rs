//! Store handle code generation.
//!
//! Generates `{Name}Store`: a cloneable handle around the runtime core with
//! a getter and a setter per field.

use super::{Plan, Shape};
use crate::parse::FieldInput;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// Generate the store handle and its accessors.
pub fn generate(plan: &Plan<'_>) -> TokenStream {
    let ident = &plan.input.ident;
    let vis = &plan.input.vis;
    let store = &plan.store;
    let doc = format!("Thread-safe configuration store for [`{}`].", ident);

    let accessors = plan.fields.iter().map(|field| generate_accessors(plan, field));
    let observers = if plan.input.notify {
        quote! {
            /// Register a callback receiving the name of each changed field.
            pub fn subscribe_property_changed(
                &self,
                callback: impl Fn(&str) + ::core::marker::Send + ::core::marker::Sync + 'static,
            ) -> ::confstore::ObserverId {
                self.core.observers().subscribe(callback)
            }

            /// Remove a property-change callback.
            pub fn unsubscribe_property_changed(&self, id: ::confstore::ObserverId) -> bool {
                self.core.observers().unsubscribe(id)
            }
        }
    } else {
        quote! {}
    };

    let hooks = if plan.input.hooks {
        quote! {}
    } else {
        quote! { impl ::confstore::StoreHooks for #ident {} }
    };

    quote! {
        #[doc = #doc]
        #[derive(Clone, Debug)]
        #vis struct #store {
            core: ::std::sync::Arc<::confstore::StoreCore<#ident>>,
        }

        impl ::confstore::GeneratedStore for #store {
            type Schema = #ident;

            fn from_core(core: ::std::sync::Arc<::confstore::StoreCore<#ident>>) -> Self {
                Self { core }
            }

            fn core(&self) -> &::std::sync::Arc<::confstore::StoreCore<#ident>> {
                &self.core
            }
        }

        impl #store {
            #(#accessors)*

            #observers
        }

        #hooks
    }
}

/// Getter and setter for one field.
fn generate_accessors(plan: &Plan<'_>, field: &FieldInput) -> TokenStream {
    let name = field.ident();
    let field_name = name.to_string();
    let setter = format_ident!("set_{}", name);
    let member = plan.member(field);
    let intercepted = member.is_some_and(|m| !m.field.plain);
    let slot_ty = plan.slot_type(field);
    let ty = &field.ty;

    let getter = quote! {
        pub fn #name(&self) -> #slot_ty {
            self.core.read(|slots| ::core::clone::Clone::clone(&slots.#name))
        }
    };

    match member.map(|m| &m.shape) {
        Some(Shape::Child(_)) => quote! {
            /// The child store of this member.
            #getter

            /// Copy `value` into the child store.
            pub fn #setter(&self, value: #ty) {
                self.core.write(#field_name, #intercepted, move |slots, _| {
                    ::confstore::drivers::copy_child(&slots.#name, &value);
                });
            }
        },
        Some(Shape::OptionalChild(_)) => quote! {
            /// The child store of this member, if present.
            #getter

            /// Copy `value` into the child store, creating or dropping it.
            pub fn #setter(&self, value: #ty) {
                self.core.write(#field_name, #intercepted, move |slots, link| {
                    ::confstore::drivers::copy_optional_child(&mut slots.#name, value.as_ref(), link);
                });
            }
        },
        _ => quote! {
            #getter

            pub fn #setter(&self, value: #ty) {
                self.core.write(#field_name, #intercepted, move |slots, _| {
                    slots.#name = value;
                });
            }
        },
    }
}
