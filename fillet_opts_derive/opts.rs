use proc_macro2::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{parenthesized, Attribute, Data, DeriveInput, Error, Field, LitStr, Path, Token};

#[derive(PartialEq)]
enum Kind {
    Opt,
    Flag,
}

struct Opt<'a> {
    kind: Kind,
    names: Vec<String>,
    desc: Option<String>,
    value_desc: Option<String>,
    env: Option<String>,
    parser: Option<Path>,
    field: &'a Field,
}

#[derive(Default)]
struct Container {
    delimeters: Option<String>,
    usage: Option<String>,
    overview: Option<String>,
    default_parser: Option<Path>,
}

fn lit_str(meta: &ParseNestedMeta) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

fn lit_path(meta: &ParseNestedMeta) -> syn::Result<Path> {
    let lit: LitStr = meta.value()?.parse()?;
    lit.parse()
}

impl<'a> Opt<'a> {
    fn from_attr(field: &'a Field, attr: &Attribute, kind: Kind) -> syn::Result<Self> {
        let mut opt = Opt {
            kind,
            names: Vec::new(),
            desc: None,
            value_desc: None,
            env: None,
            parser: None,
            field,
        };
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                opt.names = vec![lit_str(&meta)?];
            } else if meta.path.is_ident("names") {
                let content;
                parenthesized!(content in meta.input);
                let names = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                opt.names = names.iter().map(LitStr::value).collect();
            } else if meta.path.is_ident("desc") {
                opt.desc = Some(lit_str(&meta)?);
            } else if meta.path.is_ident("env") {
                opt.env = Some(lit_str(&meta)?);
            } else if meta.path.is_ident("value_desc") && opt.kind == Kind::Opt {
                opt.value_desc = Some(lit_str(&meta)?);
            } else if meta.path.is_ident("parser") && opt.kind == Kind::Opt {
                opt.parser = Some(lit_path(&meta)?);
            } else {
                return Err(meta.error(match opt.kind {
                    Kind::Opt => {
                        "expected one of: name, names(...), desc, value_desc, env, parser"
                    }
                    Kind::Flag => "expected one of: name, names(...), desc, env",
                }));
            }
            Ok(())
        })?;

        if opt.names.is_empty() {
            return Err(Error::new_spanned(attr, "Unnamed options are not allowed"));
        }
        if field.ident.is_none() {
            return Err(Error::new_spanned(field, "Tuple fields are not supported"));
        }
        Ok(opt)
    }

    fn from_field(field: &'a Field) -> syn::Result<Vec<Self>> {
        let mut opts = Vec::new();
        for attr in field.attrs.iter() {
            if attr.path().is_ident("opt") {
                opts.push(Opt::from_attr(field, attr, Kind::Opt)?);
            } else if attr.path().is_ident("flag") {
                opts.push(Opt::from_attr(field, attr, Kind::Flag)?);
            }
        }
        Ok(opts)
    }

    fn first_name(&self) -> &str {
        self.names[0].as_str()
    }
}

impl Container {
    fn from_attrs(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut cont = Container::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("optcont")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("delimeters") {
                    cont.delimeters = Some(lit_str(&meta)?);
                } else if meta.path.is_ident("usage") {
                    cont.usage = Some(lit_str(&meta)?);
                } else if meta.path.is_ident("overview") {
                    cont.overview = Some(lit_str(&meta)?);
                } else if meta.path.is_ident("default_parser") {
                    cont.default_parser = Some(lit_path(&meta)?);
                } else {
                    return Err(meta.error(
                        "expected one of: delimeters, usage, overview, default_parser",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(cont)
    }

    fn parser_for<'b>(&'b self, opt: &'b Opt) -> syn::Result<&'b Path> {
        opt.parser
            .as_ref()
            .or(self.default_parser.as_ref())
            .ok_or_else(|| Error::new_spanned(opt.field, "Unable to find parser for this field"))
    }
}

fn str_opt(s: &Option<String>) -> TokenStream {
    match s {
        Some(s) => quote!(Some(#s.to_string())),
        None => quote!(None),
    }
}

fn build_help(cont: &Container, opts: &[Opt]) -> TokenStream {
    let overview = str_opt(&cont.overview);
    let usage = str_opt(&cont.usage);
    let delimeters = str_opt(&cont.delimeters);
    let options = opts.iter().map(|opt| {
        let names = &opt.names;
        let desc = str_opt(&opt.desc);
        let value_desc = str_opt(&opt.value_desc);
        let env = str_opt(&opt.env);
        quote! {
            fillet_opts::OptionHelp {
                names: vec![#(#names.to_string()),*],
                desc: #desc,
                value_desc: #value_desc,
                env: #env,
            }
        }
    });
    quote! {
        fn help() -> fillet_opts::Help {
            fillet_opts::Help {
                overview: #overview,
                usage: #usage,
                delimeters: #delimeters,
                options: vec![#(#options),*],
            }
        }
    }
}

fn build_parse_argv(cont: &Container, opts: &[Opt]) -> syn::Result<TokenStream> {
    let delimeters = cont.delimeters.clone().unwrap_or_else(|| "=".to_string());
    let mut register = Vec::new();
    let mut assign = Vec::new();
    for opt in opts {
        let names = &opt.names;
        let name = opt.first_name();
        let field = &opt.field.ident;
        match opt.kind {
            Kind::Flag => {
                register.push(quote!(parser.flag(&[#(#names),*]);));
                assign.push(quote! {
                    if parser.has_flag(#name) {
                        assert_flag_type_is_bool(&self.#field);
                        self.#field = true;
                    }
                });
            }
            Kind::Opt => {
                let p = cont.parser_for(opt)?;
                register.push(quote!(parser.opt(&[#(#names),*]);));
                assign.push(quote! {
                    if let Some(values) = parser.get_opt(#name) {
                        for v in values {
                            <#p as fillet_opts::OptionValueParser<_>>::parse(&mut self.#field, v)
                                .map_err(|e| format!("{}: {}", #name, e))?;
                        }
                    }
                });
            }
        }
    }

    Ok(quote! {
        fn parse_argv<T, U>(&mut self, argv: T) -> std::result::Result<usize, String>
        where
            T: IntoIterator<Item = U>,
            U: AsRef<str>,
        {
            fn assert_flag_type_is_bool(_: &bool) {}

            let mut parser = fillet_opts::parser::Parser::new(argv, #delimeters);
            #(#register)*
            let consumed = parser.parse()?;
            #(#assign)*
            Ok(consumed)
        }
    })
}

fn build_parse_env(cont: &Container, opts: &[Opt]) -> syn::Result<TokenStream> {
    let mut reads = Vec::new();
    for opt in opts {
        let env = match opt.env {
            Some(ref env) => env,
            None => continue,
        };
        let field = &opt.field.ident;
        let p = cont.parser_for(opt)?;
        reads.push(quote! {
            if let Ok(val) = std::env::var(#env) {
                <#p as fillet_opts::OptionValueParser<_>>::parse(&mut self.#field, val.as_str())
                    .map_err(|e| format!("{}: {}", #env, e))?;
            }
        });
    }
    Ok(quote! {
        fn parse_env(&mut self) -> std::result::Result<(), String> {
            #(#reads)*
            Ok(())
        }
    })
}

pub fn expand(ast: &DeriveInput) -> Result<TokenStream, Vec<Error>> {
    let data = match ast.data {
        Data::Struct(ref data) => data,
        _ => {
            return Err(vec![Error::new(
                ast.ident.span(),
                "CmdLineOptions can only be derived for structs",
            )])
        }
    };

    let mut errors = Vec::new();
    let cont = Container::from_attrs(&ast.attrs).map_err(|e| vec![e])?;
    let mut opts = Vec::new();
    for field in data.fields.iter() {
        match Opt::from_field(field) {
            Ok(o) => opts.extend(o),
            Err(e) => errors.push(e),
        }
    }

    let help = build_help(&cont, &opts);
    let parse_argv = build_parse_argv(&cont, &opts).map_err(|e| errors.push(e));
    let parse_env = build_parse_env(&cont, &opts).map_err(|e| errors.push(e));
    if !errors.is_empty() {
        return Err(errors);
    }

    let name = &ast.ident;
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();
    let (parse_argv, parse_env) = (parse_argv.ok(), parse_env.ok());
    Ok(quote! {
        impl #impl_generics fillet_opts::CmdLineOptions for #name #ty_generics #where_clause {
            #help
            #parse_argv
            #parse_env
        }
    })
}
