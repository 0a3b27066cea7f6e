//! Procedural macros for rusty_watchdog
//!
//! This crate provides the instrumentation attributes of the rusty_watchdog
//! policy engine:
//! - `#[intercept]`: traps every call of the function before its body runs
//! - `#[call_scope]`: makes the function visible as a calling scope
//!
//! These macros are re-exported by the main `rusty_watchdog` crate and should
//! typically be used through that interface.
//!
//! # Examples
//!
//! ```ignore
//! use rusty_watchdog::prelude::*;
//!
//! #[intercept]
//! fn func1() -> Result<(), WatchdogError> {
//!     Ok(())
//! }
//!
//! struct ClassB;
//!
//! impl ClassB {
//!     #[call_scope]
//!     fn can_call_func2(&self) -> Result<(), WatchdogError> {
//!         func1()
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    Expr, ExprLit, FnArg, Ident, ItemFn, Lit, Meta, Pat, ReturnType, Signature, Token, Type,
    parse::Parser, parse_macro_input, punctuated::Punctuated,
};

/// Arguments parsed from `#[intercept(...)]` and `#[call_scope(...)]`
#[derive(Default)]
struct InstrumentArgs {
    name: Option<String>,
    skip: Vec<Ident>,
}

impl InstrumentArgs {
    /// Parse arguments from the attribute token stream
    fn parse(attr: TokenStream2, allow_skip: bool) -> syn::Result<Self> {
        let mut args = Self::default();
        if attr.is_empty() {
            return Ok(args);
        }

        let parser = Punctuated::<Meta, Token![,]>::parse_terminated;
        for meta in parser.parse2(attr)? {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => {
                    let Expr::Lit(ExprLit {
                        lit: Lit::Str(lit), ..
                    }) = &nv.value
                    else {
                        return Err(syn::Error::new_spanned(
                            &nv.value,
                            "Expected string literal for name",
                        ));
                    };
                    if lit.value().trim().is_empty() {
                        return Err(syn::Error::new_spanned(lit, "name must not be empty"));
                    }
                    args.name = Some(lit.value());
                }
                Meta::List(list) if allow_skip && list.path.is_ident("skip") => {
                    let idents = list.parse_args_with(Punctuated::<Ident, Token![,]>::parse_terminated)?;
                    args.skip.extend(idents);
                }
                other => {
                    let expected = if allow_skip {
                        "Expected name = \"...\" or skip(...)"
                    } else {
                        "Expected name = \"...\""
                    };
                    return Err(syn::Error::new_spanned(other, expected));
                }
            }
        }

        Ok(args)
    }
}

/// Expression producing the function identifier at runtime.
///
/// Methods with a receiver are named after `Self`; other functions after
/// their module path.
fn identifier_expr(sig: &Signature, name: Option<&str>) -> TokenStream2 {
    if let Some(name) = name {
        return quote! { #name };
    }

    let fn_name = sig.ident.to_string();
    if sig.receiver().is_some() {
        quote! {
            ::std::format!("{}::{}", ::std::any::type_name::<Self>(), #fn_name)
        }
    } else {
        quote! {
            ::core::concat!(::core::module_path!(), "::", #fn_name)
        }
    }
}

/// One serialized value per typed parameter, in declaration order
fn argument_exprs(sig: &Signature, skip: &[Ident]) -> syn::Result<Vec<TokenStream2>> {
    for ident in skip {
        let declared = sig.inputs.iter().any(|input| match input {
            FnArg::Typed(typed) => matches!(&*typed.pat, Pat::Ident(p) if p.ident == *ident),
            FnArg::Receiver(_) => false,
        });
        if !declared {
            return Err(syn::Error::new_spanned(
                ident,
                format!("Unknown parameter '{}' in skip(...)", ident),
            ));
        }
    }

    let arguments = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Typed(typed) => Some(typed),
            FnArg::Receiver(_) => None,
        })
        .map(|typed| match &*typed.pat {
            Pat::Ident(p) if !skip.contains(&p.ident) => {
                let ident = &p.ident;
                quote! { ::rusty_watchdog::intercept::argument(&#ident) }
            }
            // Skipped and destructured parameters keep their position.
            _ => quote! { ::rusty_watchdog::intercept::argument(&()) },
        })
        .collect();

    Ok(arguments)
}

/// Validate the function signature
fn validate_function(func: &ItemFn, attribute: &str, requires_result: bool) -> syn::Result<()> {
    if func.sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(
            &func.sig.asyncness,
            format!("#[{attribute}] does not support async functions: scopes are tracked per thread"),
        ));
    }

    if func.sig.constness.is_some() {
        return Err(syn::Error::new_spanned(
            &func.sig.constness,
            format!("#[{attribute}] does not support const functions"),
        ));
    }

    if requires_result {
        let is_result = match &func.sig.output {
            ReturnType::Type(_, ty) => is_result_type(ty),
            ReturnType::Default => false,
        };
        if !is_result {
            return Err(syn::Error::new_spanned(
                &func.sig,
                format!("#[{attribute}] requires return type Result<T, E> where E: From<WatchdogError>"),
            ));
        }
    }

    Ok(())
}

/// Check if a type is Result<T, E> (or an alias ending in `Result`)
fn is_result_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
    {
        return segment.ident == "Result";
    }
    false
}

/// Attribute macro that traps every call of a function
///
/// Before the body runs, the call is presented to the watchdog with the
/// function identifier, the caller's source file and the serialized
/// arguments. A rejected call returns the violation through the function's
/// own error type; an admitted call runs with the function pushed as the
/// calling scope of everything it calls.
///
/// # Arguments
///
/// * `name` - Optional identifier (defaults to `module::function` for free
///   functions and `Type::method` for methods with a receiver)
/// * `skip(...)` - Parameters recorded as `null`, for types that do not
///   implement `Serialize`
///
/// # Requirements
///
/// * Function must not be async or const
/// * Return type must be `Result<T, E>` with `E: From<WatchdogError>`
/// * Recorded parameters must implement `Serialize`
///
/// # Example
///
/// ```ignore
/// use rusty_watchdog::prelude::*;
///
/// #[intercept(name = "billing::charge", skip(card))]
/// fn charge(amount: u64, card: Card) -> Result<(), WatchdogError> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn intercept(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    match expand_intercept(attr.into(), input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Core expansion logic for the intercept macro
fn expand_intercept(attr: TokenStream2, input_fn: ItemFn) -> syn::Result<TokenStream2> {
    validate_function(&input_fn, "intercept", true)?;
    let args = InstrumentArgs::parse(attr, true)?;

    let identifier = identifier_expr(&input_fn.sig, args.name.as_deref());
    let arguments = argument_exprs(&input_fn.sig, &args.skip)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input_fn;

    Ok(quote! {
        #(#attrs)*
        #[track_caller]
        #vis #sig {
            let __watchdog_call = ::rusty_watchdog::intercept::trap(
                &#identifier,
                ::std::panic::Location::caller().file(),
                ::std::vec![#(#arguments),*],
            )?;
            #block
        }
    })
}

/// Attribute macro that marks a function as a calling scope
///
/// The function is not trapped itself; calls it makes see it as their
/// scope, so exceptions such as `{ "scope": "ClassB::can_call_func2()" }`
/// can name it.
///
/// # Arguments
///
/// * `name` - Optional identifier, with the same defaults as `#[intercept]`
///
/// # Example
///
/// ```ignore
/// use rusty_watchdog::prelude::*;
///
/// struct ClassB;
///
/// impl ClassB {
///     #[call_scope]
///     fn can_call_func2(&self) -> Result<(), WatchdogError> {
///         func2()
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn call_scope(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input_fn = parse_macro_input!(item as ItemFn);

    match expand_call_scope(attr.into(), input_fn) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_call_scope(attr: TokenStream2, input_fn: ItemFn) -> syn::Result<TokenStream2> {
    validate_function(&input_fn, "call_scope", false)?;
    let args = InstrumentArgs::parse(attr, false)?;
    let identifier = identifier_expr(&input_fn.sig, args.name.as_deref());

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input_fn;

    Ok(quote! {
        #(#attrs)*
        #vis #sig {
            let __watchdog_scope = ::rusty_watchdog::intercept::enter_scope(
                &#identifier,
                ::core::file!(),
            );
            #block
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_fn(tokens: TokenStream2) -> ItemFn {
        syn::parse2(tokens).unwrap()
    }

    #[test]
    fn test_parse_args() {
        let args = InstrumentArgs::parse(quote! { name = "app::run", skip(a, b) }, true).unwrap();
        assert_eq!(args.name.as_deref(), Some("app::run"));
        assert_eq!(args.skip.len(), 2);

        assert!(InstrumentArgs::parse(quote! { skip(a) }, false).is_err());
        assert!(InstrumentArgs::parse(quote! { name = 5 }, true).is_err());
        assert!(InstrumentArgs::parse(quote! { name = "  " }, true).is_err());
        assert!(InstrumentArgs::parse(quote! { unknown }, true).is_err());
    }

    #[test]
    fn test_validate_rejects_async_and_non_result() {
        let func = parse_fn(quote! { async fn f() -> Result<(), E> { Ok(()) } });
        assert!(validate_function(&func, "intercept", true).is_err());

        let func = parse_fn(quote! { fn f() -> u32 { 1 } });
        assert!(validate_function(&func, "intercept", true).is_err());
        assert!(validate_function(&func, "call_scope", false).is_ok());

        let func = parse_fn(quote! { fn f() -> io::Result<()> { Ok(()) } });
        assert!(validate_function(&func, "intercept", true).is_ok());
    }

    #[test]
    fn test_unknown_skip_parameter() {
        let func = parse_fn(quote! { fn f(a: u32) -> Result<(), E> { Ok(()) } });
        let skip = vec![Ident::new("b", proc_macro2::Span::call_site())];
        assert!(argument_exprs(&func.sig, &skip).is_err());
    }

    #[test]
    fn test_arguments_skip_receiver() {
        let func = parse_fn(quote! { fn f(&self, a: u32, (b, c): (u8, u8)) -> Result<(), E> { Ok(()) } });
        assert_eq!(argument_exprs(&func.sig, &[]).unwrap().len(), 2);
    }

    #[test]
    fn test_expansion_traps_before_body() {
        let func = parse_fn(quote! { fn func1(x: u32) -> Result<(), E> { Ok(()) } });
        let expanded = expand_intercept(TokenStream2::new(), func).unwrap().to_string();
        assert!(expanded.contains("track_caller"));
        assert!(expanded.contains("trap"));
        assert!(expanded.contains("module_path"));
    }
}
