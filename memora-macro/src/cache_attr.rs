use proc_macro::TokenStream;
use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{ToTokens, quote};
use syn::{
    Expr, FnArg, GenericParam, Ident, ItemFn, LitInt, Pat, ReturnType, Token, Type, parse::Parse,
    parse::ParseStream, parse_macro_input,
};

/// Expiration requested on the attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirySpec {
    Minutes(u64),
    Seconds(u64),
    Never,
}

/// Arguments for the cached attribute
/// Parses: #[cached], #[cached(minutes = 10)], #[cached(minutes = -1)],
/// #[cached(seconds = 30)], #[cached(never_expire)], #[cached(using = expr)],
/// #[cached(using = expr, declaring = Self)]
#[derive(Default)]
pub struct CachedArgs {
    pub expiry: Option<ExpirySpec>,
    pub using: Option<Expr>,
    pub declaring: Option<Type>,
}

impl Parse for CachedArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = CachedArgs::default();

        while !input.is_empty() {
            let ident: Ident = input.parse()?;

            match ident.to_string().as_str() {
                "never_expire" => args.set_expiry(&ident, ExpirySpec::Never)?,
                "minutes" | "mins" => {
                    input.parse::<Token![=]>()?;
                    let negative = input.parse::<Option<Token![-]>>()?.is_some();
                    let value: LitInt = input.parse()?;
                    let minutes = value.base10_parse::<u64>()?;
                    let spec = if negative && minutes > 0 {
                        ExpirySpec::Never
                    } else {
                        ExpirySpec::Minutes(minutes)
                    };
                    args.set_expiry(&ident, spec)?;
                }
                "seconds" | "secs" => {
                    input.parse::<Token![=]>()?;
                    let value: LitInt = input.parse()?;
                    args.set_expiry(&ident, ExpirySpec::Seconds(value.base10_parse()?))?;
                }
                "using" => {
                    input.parse::<Token![=]>()?;
                    if args.using.is_some() {
                        return Err(syn::Error::new(ident.span(), "duplicate `using` argument"));
                    }
                    args.using = Some(input.parse()?);
                }
                "declaring" => {
                    input.parse::<Token![=]>()?;
                    if args.declaring.is_some() {
                        return Err(syn::Error::new(ident.span(), "duplicate `declaring` argument"));
                    }
                    args.declaring = Some(input.parse()?);
                }
                other => {
                    return Err(syn::Error::new(
                        ident.span(),
                        format!(
                            "unknown cached argument `{}`; expected `minutes`, `seconds`, `never_expire`, `using` or `declaring`",
                            other
                        ),
                    ));
                }
            }

            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }

        Ok(args)
    }
}

impl CachedArgs {
    fn set_expiry(&mut self, ident: &Ident, spec: ExpirySpec) -> syn::Result<()> {
        if self.expiry.is_some() {
            return Err(syn::Error::new(
                ident.span(),
                "expiration specified more than once",
            ));
        }
        self.expiry = Some(spec);
        Ok(())
    }
}

impl ExpirySpec {
    fn expr(&self, krate: &TokenStream2) -> TokenStream2 {
        match self {
            ExpirySpec::Minutes(minutes) => quote! { #krate::Expiration::minutes(#minutes) },
            ExpirySpec::Seconds(seconds) => quote! { #krate::Expiration::seconds(#seconds) },
            ExpirySpec::Never => quote! { #krate::Expiration::Never },
        }
    }
}

/// Path to the cache crate as seen from the crate being compiled.
///
/// Prefers the `memora` facade so callers need no direct dependency on
/// `memora-cache`.
fn cache_crate_path() -> TokenStream2 {
    match crate_name("memora") {
        Ok(FoundCrate::Itself) => quote! { ::memora::memora_cache },
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote! { ::#ident::memora_cache }
        }
        Err(_) => match crate_name("memora-cache") {
            Ok(FoundCrate::Name(name)) => {
                let ident = Ident::new(&name, Span::call_site());
                quote! { ::#ident }
            }
            _ => quote! { ::memora_cache },
        },
    }
}

/// Implementation of the `#[cached(...)]` attribute macro.
///
/// The annotated function must be `async` and return a `Result` whose error
/// type implements `From<memora_cache::CacheError>`. Every argument must
/// implement `serde::Serialize` and the success type must implement both
/// `Serialize` and `DeserializeOwned`.
///
/// # Usage
///
/// ```ignore
/// use memora::{cached, CacheAware, CacheInterceptor};
///
/// struct Catalog {
///     cache: CacheInterceptor,
/// }
///
/// impl CacheAware for Catalog {
///     fn interceptor(&self) -> &CacheInterceptor {
///         &self.cache
///     }
/// }
///
/// impl Catalog {
///     // Default expiration of the interceptor
///     #[cached]
///     async fn product(&self, id: u64) -> Result<Product, AppError> { ... }
///
///     // Ten minutes, refreshed on every hit
///     #[cached(minutes = 10)]
///     async fn search(&self, query: &str) -> Result<Vec<u64>, AppError> { ... }
///
///     // Never expires
///     #[cached(minutes = -1)]
///     async fn categories(&self) -> Result<Vec<String>, AppError> { ... }
/// }
///
/// // Free functions name their interceptor explicitly
/// #[cached(using = interceptor(), seconds = 30)]
/// async fn exchange_rate(from: &str, to: &str) -> Result<f64, AppError> { ... }
///
/// impl Catalog {
///     // Associated functions without `self` must name their type,
///     // otherwise the key only carries the module path
///     #[cached(using = interceptor(), declaring = Self)]
///     async fn by_sku(sku: &str) -> Result<u64, AppError> { ... }
/// }
/// ```
///
/// # How It Works
///
/// The macro replaces the body with a call that:
/// 1. Describes the method (declaring type, name, generic and parameter types)
/// 2. Serializes the arguments in declaration order
/// 3. Runs the original body through `CacheInterceptor::memoize`
pub fn cached_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as CachedArgs);
    let input = parse_macro_input!(item as ItemFn);

    match expand(args, input, &cache_crate_path()) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(args: CachedArgs, input: ItemFn, krate: &TokenStream2) -> syn::Result<TokenStream2> {
    let sig = &input.sig;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[cached] can only be applied to async functions",
        ));
    }

    let func_name = sig.ident.to_string();
    let func_attrs = &input.attrs;
    let func_vis = &input.vis;
    let func_body = &input.block;

    let mut receiver = None;
    let mut params = Vec::new();
    let mut arguments = Vec::new();

    for input in &sig.inputs {
        match input {
            FnArg::Receiver(recv) => receiver = Some(recv),
            FnArg::Typed(typed) => {
                let Pat::Ident(pat) = typed.pat.as_ref() else {
                    return Err(syn::Error::new_spanned(
                        &typed.pat,
                        "#[cached] arguments must be plain identifiers",
                    ));
                };
                let name = &pat.ident;
                let name_str = name.to_string();
                let ty = &typed.ty;

                // `impl Trait` cannot be named in expression position
                if ty.to_token_stream().to_string().contains("impl ") {
                    params.push(quote! { .with_param(#name_str, stringify!(#ty)) });
                } else {
                    params.push(quote! { .with_param_of::<#ty>(#name_str) });
                }
                arguments.push(quote! { .with(&#name) });
            }
        }
    }

    let generics: Vec<TokenStream2> = sig
        .generics
        .params
        .iter()
        .filter_map(|param| match param {
            GenericParam::Type(ty) => {
                let ident = &ty.ident;
                Some(quote! { .with_generic_of::<#ident>() })
            }
            GenericParam::Const(c) => {
                let ident = &c.ident;
                Some(quote! { .with_generic(#ident.to_string()) })
            }
            GenericParam::Lifetime(_) => None,
        })
        .collect();

    let descriptor = match (&args.declaring, receiver) {
        (Some(ty), _) => quote! { #krate::MethodDescriptor::of::<#ty>(#func_name) },
        (None, Some(_)) => quote! { #krate::MethodDescriptor::of::<Self>(#func_name) },
        (None, None) => quote! { #krate::MethodDescriptor::new(module_path!(), #func_name) },
    };

    let source = match (&args.using, receiver) {
        (Some(expr), _) => quote! { #expr },
        (None, Some(recv)) if recv.reference.is_some() => {
            quote! { #krate::CacheAware::interceptor(self) }
        }
        (None, Some(recv)) if recv.colon_token.is_some() => {
            quote! { #krate::CacheAware::interceptor(&*self) }
        }
        (None, Some(_)) => quote! { #krate::CacheAware::interceptor(&self) },
        (None, None) => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "#[cached] on a function without `self` needs `using = <interceptor>`",
            ));
        }
    };

    // Pins the body's type so `?` and `return` inside it resolve against
    // the declared output.
    let output = match &sig.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };

    let with_expiry = args.expiry.map(|spec| {
        let expiration = spec.expr(krate);
        quote! { let __memora_interceptor = __memora_interceptor.with_expiration(#expiration); }
    });

    Ok(quote! {
        #(#func_attrs)*
        #func_vis #sig {
            let __memora_descriptor = #descriptor
                #(#generics)*
                #(#params)*;
            let __memora_arguments = #krate::InvocationArguments::new()
                #(#arguments)*;
            let __memora_interceptor = #krate::CacheInterceptor::clone(&(#source));
            #with_expiry

            __memora_interceptor
                .memoize(&__memora_descriptor, &__memora_arguments, move || async move {
                    ::core::convert::identity::<#output>(#func_body)
                })
                .await
        }
    })
}
