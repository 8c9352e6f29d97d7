// omgidl: OMG IDL / WebIDL front end

use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use omgidl::parser::ast::*;
use omgidl::preprocessor::preprocess_with_options;
use omgidl::{walk, Dialect, NodeVisitor, ParseOptions};

#[derive(Parser)]
#[command(name = "omgidl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Preprocess and parse OMG IDL, printing an outline of the definitions")]
struct Cli {
    /// Input file, or `-` for standard input
    #[arg(value_name = "FILE")]
    file: String,

    /// Use the WebIDL-leaning dialect
    #[arg(long)]
    webidl: bool,

    /// Add a directory to the #include search path
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Predefine a macro as NAME or NAME=VALUE
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    define: Vec<String>,

    /// Print the preprocessed text and stop
    #[arg(short = 'E')]
    preprocess_only: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> ParseOptions {
        let mut options = ParseOptions::new().with_dialect(Dialect::from_webidl(self.webidl));
        for dir in &self.include {
            options = options.with_include_dir(dir.clone());
        }
        for define in &self.define {
            options = options.with_define_arg(define);
        }
        options
    }
}

/// Prints one indented line per visited node.
struct Outline<W: Write> {
    out: W,
    depth: usize,
}

impl<W: Write> Outline<W> {
    fn new(out: W) -> Self {
        Outline { out, depth: 0 }
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{:indent$}{}", "", text, indent = self.depth * 2)
    }

    fn open(&mut self, text: &str) -> io::Result<()> {
        self.line(text)?;
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }
}

fn anonymous(name: &Option<String>) -> &str {
    name.as_deref().unwrap_or("<anonymous>")
}

fn declarators(declarators: &[Declarator]) -> String {
    declarators
        .iter()
        .map(Declarator::name)
        .collect::<Vec<_>>()
        .join(", ")
}

impl<W: Write> NodeVisitor for Outline<W> {
    type Error = io::Error;

    fn visit_specification(&mut self, node: &Specification) -> io::Result<()> {
        self.open(&format!("specification ({} definitions)", node.definitions.len()))
    }

    fn depart_specification(&mut self, _: &Specification) -> io::Result<()> {
        self.close()
    }

    fn visit_module(&mut self, node: &Module) -> io::Result<()> {
        self.open(&format!("module {}", node.name))
    }

    fn depart_module(&mut self, _: &Module) -> io::Result<()> {
        self.close()
    }

    fn visit_interface(&mut self, node: &Interface) -> io::Result<()> {
        let mut text = format!("interface {}", node.name);
        match &node.supers {
            Some(supers) if !supers.is_empty() => {
                let names: Vec<_> = supers.iter().map(ToString::to_string).collect();
                text.push_str(&format!(" : {}", names.join(", ")));
            }
            _ => {}
        }
        if node.is_forward() {
            text.push_str(" (forward)");
        }
        self.open(&text)
    }

    fn depart_interface(&mut self, _: &Interface) -> io::Result<()> {
        self.close()
    }

    fn visit_value_type(&mut self, node: &ValueType) -> io::Result<()> {
        let mut text = format!("valuetype {}", anonymous(&node.name));
        if let Some(base) = &node.inheritance {
            text.push_str(&format!(" : {}", base));
        }
        self.open(&text)
    }

    fn depart_value_type(&mut self, _: &ValueType) -> io::Result<()> {
        self.close()
    }

    fn visit_struct(&mut self, node: &StructDef) -> io::Result<()> {
        self.open(&format!("struct {}", anonymous(&node.name)))
    }

    fn depart_struct(&mut self, _: &StructDef) -> io::Result<()> {
        self.close()
    }

    fn visit_enum(&mut self, node: &EnumDef) -> io::Result<()> {
        self.open(&format!(
            "enum {} {{ {} }}",
            anonymous(&node.name),
            node.enumerators.join(", ")
        ))
    }

    fn depart_enum(&mut self, _: &EnumDef) -> io::Result<()> {
        self.close()
    }

    fn visit_union(&mut self, node: &UnionDef) -> io::Result<()> {
        self.open(&format!(
            "union {} switch ({})",
            anonymous(&node.name),
            node.switch_type
        ))
    }

    fn depart_union(&mut self, _: &UnionDef) -> io::Result<()> {
        self.close()
    }

    fn visit_type_def(&mut self, node: &TypeDef) -> io::Result<()> {
        self.line(&format!("typedef {} {}", node.type_spec, declarators(&node.declarators)))
    }

    fn visit_native_decl(&mut self, node: &NativeDecl) -> io::Result<()> {
        match &node.native_type {
            Some(raw) => self.line(&format!("native {} ({})", node.name, raw.trim())),
            None => self.line(&format!("native {}", node.name)),
        }
    }

    fn visit_attr_def(&mut self, node: &AttrDef) -> io::Result<()> {
        let names: Vec<_> = node.declarators.iter().map(|d| d.name.as_str()).collect();
        self.line(&format!(
            "{}attribute {}{} {}",
            if node.readonly { "readonly " } else { "" },
            node.type_spec,
            if node.nullable { "?" } else { "" },
            names.join(", ")
        ))
    }

    fn visit_operation_def(&mut self, node: &OperationDef) -> io::Result<()> {
        let mut params: Vec<String> = node
            .parameters
            .items
            .iter()
            .map(|p| {
                let directions: Vec<_> = p.directions.iter().map(ToString::to_string).collect();
                format!("{} {} {}", directions.join(" "), p.type_spec, p.name)
                    .trim_start()
                    .to_string()
            })
            .collect();
        if node.parameters.varargs.is_some() {
            params.push("...".to_string());
        }
        let modifiers: String = node.modifiers.iter().map(|m| format!("{} ", m)).collect();
        self.line(&format!(
            "{}operation {} {}({})",
            modifiers,
            node.return_type,
            node.name,
            params.join(", ")
        ))
    }

    fn visit_field_def(&mut self, node: &FieldDef) -> io::Result<()> {
        self.line(&format!("field {} {}", node.type_spec, declarators(&node.declarators)))
    }

    fn visit_const_decl(&mut self, node: &ConstDecl) -> io::Result<()> {
        self.line(&format!("const {} {}", node.const_type, node.name))
    }
}

fn read_source(file: &str) -> io::Result<(String, Option<String>)> {
    if file == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        Ok((source, None))
    } else {
        Ok((fs::read_to_string(file)?, Some(file.to_string())))
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let (source, name) = match read_source(&cli.file) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error: Couldn't read '{}': {}", cli.file, e);
            process::exit(1);
        }
    };
    let options = cli.options();

    if cli.preprocess_only {
        match preprocess_with_options(&source, name.as_deref(), &options) {
            Ok(text) => print!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let spec = match omgidl::parse_with_options(&source, name.as_deref(), &options) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let stdout = io::stdout();
    let mut outline = Outline::new(stdout.lock());
    if let Err(e) = walk(&mut outline, &spec) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
