use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, bail};
use clap::Parser;
use const_format::concatcp;
use xmltw::{
    Formatting, XmlOutputBuffer, XmlTextWriter, XmlWriterSettings, find_encoding_handler,
};

const GENERATOR: &str = concatcp!(
    " generated by ",
    env!("CARGO_PKG_NAME"),
    " ",
    env!("CARGO_PKG_VERSION"),
    " "
);
const CHUNK_SIZE: usize = 3 * 4096;

#[derive(clap::Parser, Debug)]
#[command(
    version,
    name = "xmlwrap",
    about = "Wrap files into a single XML document as base64 or hex encoded elements.",
    arg_required_else_help = true
)]
struct CmdArgs {
    #[clap(required = true)]
    files: Vec<String>,
    /// local name of the root element
    #[arg(long, default_value = "files")]
    root: String,
    /// namespace of every element written
    #[arg(long, value_name = "URI")]
    namespace: Option<String>,
    /// prefix bound to the namespace, the default namespace is used otherwise
    #[arg(long, requires = "namespace")]
    prefix: Option<String>,
    /// indent the output with N spaces per level
    #[arg(long, value_name = "N")]
    indent: Option<usize>,
    /// quote attribute values with apostrophes
    #[arg(long)]
    single_quote: bool,
    /// encode file contents in hexadecimal instead of base64
    #[arg(long)]
    binhex: bool,
    /// output encoding
    #[arg(long, value_name = "label")]
    encoding: Option<String>,
    /// write standalone="yes" in the XML declaration
    #[arg(long)]
    standalone: bool,
    /// save to a given file
    #[arg(short, long, value_name = "file", default_value = "-")]
    output: String,
}

fn wrap_file(writer: &mut XmlTextWriter, args: &CmdArgs, path: &str) -> anyhow::Result<()> {
    let file = File::open(path).with_context(|| format!("failed to open {path}"))?;
    let size = file
        .metadata()
        .with_context(|| format!("failed to stat {path}"))?
        .len();
    let name = Path::new(path)
        .file_name()
        .map_or_else(|| path.into(), |name| name.to_string_lossy());

    let prefix = args.prefix.as_deref();
    let ns = args.namespace.as_deref();
    writer.start_element(prefix, "file", ns)?;
    writer.write_attribute_string(None, "name", None, &name)?;
    writer.write_attribute_string(None, "size", None, &size.to_string())?;
    writer.write_attribute_string(
        None,
        "encoding",
        None,
        if args.binhex { "hex" } else { "base64" },
    )?;

    let mut reader = BufReader::new(file);
    let mut chunk = vec![0; CHUNK_SIZE];
    loop {
        let len = reader
            .read(&mut chunk)
            .with_context(|| format!("failed to read {path}"))?;
        if len == 0 {
            break;
        }
        if args.binhex {
            writer.write_bin_hex(&chunk[..len])?;
        } else {
            writer.write_base64(&chunk[..len])?;
        }
    }
    writer.full_end_element()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = CmdArgs::parse();

    let encoder = match args.encoding.as_deref() {
        Some(label) => match find_encoding_handler(label) {
            Some(encoder) => Some(encoder),
            None => bail!("unknown encoding '{label}'"),
        },
        None => None,
    };
    let out = XmlOutputBuffer::from_uri(&args.output, encoder)
        .with_context(|| format!("failed to create {}", args.output))?;

    let settings = XmlWriterSettings {
        formatting: if args.indent.is_some() {
            Formatting::Indented
        } else {
            Formatting::None
        },
        indentation: args.indent.unwrap_or(2),
        quote_char: if args.single_quote { '\'' } else { '"' },
        ..Default::default()
    };
    let mut writer = XmlTextWriter::with_settings(out, settings)?;

    writer.start_document(args.standalone.then_some(true))?;
    writer.write_comment(GENERATOR)?;
    writer.start_element(
        args.prefix.as_deref(),
        &args.root,
        args.namespace.as_deref(),
    )?;
    for path in &args.files {
        wrap_file(&mut writer, &args, path)?;
    }
    writer.end_document()?;
    writer.close()?;
    Ok(())
}
