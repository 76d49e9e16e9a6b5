use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::LitStr;

use crate::entity::Model;

pub fn expand(model: &Model) -> TokenStream {
    let ident = &model.ident;
    let (impl_generics, ty_generics, where_clause) = model.generics.split_for_impl();

    let name = ident.to_string();
    let table = optional(model.table.as_ref());
    let default_sort = optional(model.default_sort.as_ref());
    let interface = model.interface;

    let properties = model.fields.iter().map(|field| {
        let name = &field.name;
        let column = &field.column;
        let type_name = field.ty.to_token_stream().to_string().replace(' ', "");
        let (key, explicit_key, computed, ignore_update, write) = (
            field.key,
            field.explicit_key,
            field.computed,
            field.ignore_update,
            field.write,
        );
        quote! {
            ::tabula_orm::Property {
                name: #name,
                column: #column,
                type_name: #type_name,
                key: #key,
                explicit_key: #explicit_key,
                computed: #computed,
                ignore_update: #ignore_update,
                write: #write,
            }
        }
    });

    let from_row = model.fields.iter().map(|field| {
        let field_ident = &field.ident;
        let ty = &field.ty;
        let name = &field.name;
        let column = &field.column;
        if field.write {
            quote! { #field_ident: ::tabula_orm::fetch_column::<#ty>(row, #column, #name)? }
        } else {
            quote! { #field_ident: ::core::default::Default::default() }
        }
    });

    let values = model.fields.iter().filter(|field| field.write).map(|field| {
        let field_ident = &field.ident;
        let ty = &field.ty;
        let name = &field.name;
        quote! {
            (
                #name,
                <::tabula_orm::__private::Value as ::core::convert::From<#ty>>::from(
                    ::core::clone::Clone::clone(&self.#field_ident),
                ),
            )
        }
    });

    quote! {
        impl #impl_generics ::tabula_orm::Entity for #ident #ty_generics #where_clause {
            const NAME: &'static str = #name;
            const TABLE: ::core::option::Option<&'static str> = #table;
            const DEFAULT_SORT: ::core::option::Option<&'static str> = #default_sort;
            const INTERFACE: bool = #interface;

            fn properties() -> &'static [::tabula_orm::Property] {
                const PROPERTIES: &[::tabula_orm::Property] = &[#(#properties),*];
                PROPERTIES
            }

            fn from_row(row: &::tabula_orm::Row) -> ::tabula_orm::Result<Self> {
                ::core::result::Result::Ok(Self {
                    #(#from_row,)*
                })
            }

            fn values(&self) -> ::std::vec::Vec<(&'static str, ::tabula_orm::__private::Value)> {
                ::std::vec![#(#values),*]
            }
        }
    }
}

fn optional(lit: Option<&LitStr>) -> TokenStream {
    lit.map_or_else(
        || quote! { ::core::option::Option::None },
        |lit| quote! { ::core::option::Option::Some(#lit) },
    )
}
