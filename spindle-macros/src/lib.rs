use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use syn::ext::IdentExt as _;
use syn::spanned::Spanned as _;
use syn::{
    Attribute, Data, DeriveInput, Error, FnArg, GenericArgument, Ident, ImplItem, ItemImpl, LitStr,
    Pat, PathArguments, Type,
};

const INJECT_ATTR: &str = "inject";
const FACTORY_ATTR: &str = "factory";

fn extract_generic_type(ty: &Type, wrapper: &str) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == wrapper
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

fn is_owner_type(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Path(type_path)
            if type_path.qself.is_none()
                && type_path.path.segments.last().is_some_and(|v| v.ident == "Owner")
    )
}

enum InjectAttr {
    Property(LitStr),
    Default,
}

fn parse_inject_attr(attrs: &[Attribute]) -> syn::Result<Option<InjectAttr>> {
    for attr in attrs {
        if !attr.path().is_ident(INJECT_ATTR) {
            continue;
        }
        let meta_list = attr.meta.require_list()?;
        if let Ok(property) = syn::parse2::<LitStr>(meta_list.tokens.clone()) {
            return Ok(Some(InjectAttr::Property(property)));
        }
        if let Ok(ident) = syn::parse2::<Ident>(meta_list.tokens.clone())
            && ident == "default"
        {
            return Ok(Some(InjectAttr::Default));
        }
        return Err(Error::new(
            attr.span(),
            format!("expected #[{INJECT_ATTR}(\"property\")] or #[{INJECT_ATTR}(default)]"),
        ));
    }
    Ok(None)
}

/// Builds the expression extracting one value from `injections`.
///
/// `name` is the field or argument name, used as the property when no
/// explicit one is given.
fn injection_expr(name: &Ident, ty: &Type, attrs: &[Attribute]) -> syn::Result<TokenStream2> {
    let attr = parse_inject_attr(attrs)?;
    let property = match &attr {
        Some(InjectAttr::Default) => return Ok(quote! { ::std::default::Default::default() }),
        Some(InjectAttr::Property(property)) => property.clone(),
        None => {
            if is_owner_type(ty) {
                return Ok(quote! { ::std::clone::Clone::clone(injections.owner()) });
            }
            LitStr::new(&name.unraw().to_string(), name.span())
        }
    };
    if let Some(inner_type) = extract_generic_type(ty, "Arc") {
        return Ok(quote! { injections.require::<#inner_type>(#property)? });
    }
    if let Some(option_type) = extract_generic_type(ty, "Option")
        && let Some(inner_type) = extract_generic_type(&option_type, "Arc")
    {
        return Ok(quote! { injections.get::<#inner_type>(#property) });
    }
    Err(Error::new(
        ty.span(),
        format!(
            "Injected values must be of type Arc<T>, Option<Arc<T>> or Owner, or use #[{INJECT_ATTR}(default)]"
        ),
    ))
}

/// Derive macro for the Injectable trait
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    handle_derive_injectable(input)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

/// Attribute macro for impl blocks with a factory method
#[proc_macro_attribute]
pub fn injectable(_attr: TokenStream, item: TokenStream) -> TokenStream {
    if let Ok(item_impl) = syn::parse::<ItemImpl>(item) {
        return handle_injectable_impl(item_impl)
            .unwrap_or_else(Error::into_compile_error)
            .into();
    }
    TokenStream::from(
        Error::new(
            proc_macro2::Span::call_site(),
            "#[injectable] can only be applied to impl blocks",
        )
        .to_compile_error(),
    )
}

fn handle_derive_injectable(input: DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(s) => &s.fields,
        _ => return Err(Error::new(name.span(), "Only structs are supported")),
    };

    let body = match fields {
        syn::Fields::Named(fields) => {
            let mut field_inits = Vec::new();
            for field in &fields.named {
                let Some(field_ident) = field.ident.as_ref() else {
                    continue;
                };
                let value = injection_expr(field_ident, &field.ty, &field.attrs)?;
                field_inits.push(quote! { #field_ident: #value });
            }
            quote! { Self { #(#field_inits,)* } }
        }
        syn::Fields::Unnamed(_) => {
            return Err(Error::new(name.span(), "Tuple structs are not supported"));
        }
        syn::Fields::Unit => quote! { Self },
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        impl #impl_generics ::spindle::Injectable for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn create(
                injections: &::spindle::Injections,
            ) -> ::std::result::Result<Self, ::spindle::StdError> {
                Ok(#body)
            }
        }
    })
}

fn handle_injectable_impl(input: ItemImpl) -> syn::Result<TokenStream2> {
    if input.trait_.is_some() {
        return Err(Error::new(input.span(), "Trait impls are not supported"));
    }

    let self_ty = &input.self_ty;
    let mut factory_method = None;

    for item in &input.items {
        if let ImplItem::Fn(method) = item {
            for attr in &method.attrs {
                if attr.path().is_ident(FACTORY_ATTR) {
                    if factory_method.is_some() {
                        return Err(Error::new(attr.span(), "Only one factory method allowed"));
                    }
                    factory_method = Some(method);
                }
            }
        }
    }

    let Some(method) = factory_method else {
        return Err(Error::new(input.span(), "No factory method found"));
    };

    if method.sig.asyncness.is_some() {
        return Err(Error::new(
            method.sig.span(),
            "Factory methods must be synchronous",
        ));
    }

    let method_name = &method.sig.ident;
    let is_result = match &method.sig.output {
        syn::ReturnType::Default => {
            return Err(Error::new(
                method.sig.span(),
                "Factory method must return Self or Result<Self, E>",
            ));
        }
        syn::ReturnType::Type(_, ty) => extract_generic_type(ty, "Result").is_some(),
    };

    let mut arg_values = Vec::new();
    let mut cleaned_inputs = Vec::new();

    for fn_arg in &method.sig.inputs {
        let pat_type = match fn_arg {
            FnArg::Receiver(_) => {
                return Err(Error::new(
                    fn_arg.span(),
                    "Factory method cannot have self parameter",
                ));
            }
            FnArg::Typed(pat_type) => pat_type,
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(Error::new(
                pat_type.pat.span(),
                "Only simple bindings supported",
            ));
        };
        arg_values.push(injection_expr(
            &pat_ident.ident,
            &pat_type.ty,
            &pat_type.attrs,
        )?);

        // Create cleaned parameter without inject attributes
        let mut cleaned_pat_type = pat_type.clone();
        cleaned_pat_type
            .attrs
            .retain(|attr| !attr.path().is_ident(INJECT_ATTR));
        cleaned_inputs.push(FnArg::Typed(cleaned_pat_type));
    }

    // Remove inject attributes from parameters and the factory attribute
    let mut cleaned_input = input.clone();
    for item in &mut cleaned_input.items {
        if let ImplItem::Fn(method) = item
            && method
                .attrs
                .iter()
                .any(|attr| attr.path().is_ident(FACTORY_ATTR))
        {
            method.sig.inputs = cleaned_inputs.into_iter().collect();
            method
                .attrs
                .retain(|attr| !attr.path().is_ident(FACTORY_ATTR));
            break;
        }
    }

    let method_call = quote! { Self::#method_name(#(#arg_values),*) };
    let create_body = if is_result {
        quote! { #method_call.map_err(::std::convert::Into::into) }
    } else {
        quote! { Ok(#method_call) }
    };

    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    Ok(quote! {
        #cleaned_input

        impl #impl_generics ::spindle::Injectable for #self_ty #where_clause {
            #[allow(unused_variables)]
            fn create(
                injections: &::spindle::Injections,
            ) -> ::std::result::Result<Self, ::spindle::StdError> {
                #create_body
            }
        }
    })
}
