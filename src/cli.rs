use clap::{ArgAction, Parser};
use h2p_lib::{LocatorParseError, LocatorSpec};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "h2p")]
#[command(
    version,
    about = "Convert a web page or local HTML file to PDF with headless Chrome",
    long_about = "h2p\n\nPrints a web page, a local HTML file or HTML read from stdin to PDF. \
A matching chromedriver is downloaded into the current directory (or into --driver-dir) on first use.\n\n\
Examples:\n  h2p -f demo/index.html converted.pdf\n  \
h2p -f -l \"Xpath=//div[@class='quote']//span[@class='price']\" -p l,sc=0.95,ml=20,pr=1-3 https://example.com/quote basf"
)]
pub struct Cli {
    #[arg(help = "http(s) URL, local HTML file, or '-' to read HTML lines from stdin")]
    pub source: String,

    #[arg(help = "PDF file name ('.pdf' is appended when missing)")]
    pub output: PathBuf,

    #[arg(short, long, help = "Overwrite an existing PDF without asking")]
    pub force: bool,

    #[arg(short = 'n', long, help = "Print without header and footer")]
    pub no_header_footer: bool,

    #[arg(
        short,
        long,
        value_name = "KIND=VALUE",
        value_parser = parse_locator,
        help = "Wait until exactly one element matches before printing. Kinds: ClassName, CssSelector, Id, Name, LinkText, PartialLinkText, TagName, Xpath"
    )]
    pub locator: Option<LocatorSpec>,

    #[arg(
        short,
        long = "page",
        value_name = "SETTING[,...]",
        action = ArgAction::Append,
        help = "Page settings: l|landscape, pw|paperWidth=MM, ph|paperHeight=MM, ml|marginLeft=MM, ht|headerTemplate=HTML, ft|footerTemplate=HTML, sc|scale=F, pr|pageRanges=RANGE"
    )]
    pub page: Vec<String>,

    #[arg(long, value_name = "SECS", help = "Locator wait timeout in seconds (default: 10)")]
    pub wait_timeout: Option<u64>,

    #[arg(
        long,
        value_name = "PATH",
        help = "Directory chromedriver is installed into (default: current directory)"
    )]
    pub driver_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "VERSION",
        help = "Match chromedriver to this Chrome version instead of detecting it"
    )]
    pub browser_version: Option<String>,

    #[arg(long, help = "Reinstall chromedriver even if the installed one is current")]
    pub force_download: bool,

    #[arg(
        long,
        value_name = "PATH",
        help = "Optional config file (TOML) with page/driver/timeout defaults; CLI flags override config"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// Accepts `KIND=VALUE` and the colon form `:KIND=VALUE` (`-l:Id=price`).
fn parse_locator(raw: &str) -> Result<LocatorSpec, LocatorParseError> {
    raw.strip_prefix(':').unwrap_or(raw).parse()
}

pub fn parse() -> Cli {
    Cli::parse()
}
