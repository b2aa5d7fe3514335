use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::warn;
use structopt::StructOpt;

use serial_proto::{CorruptPolicy, Link, ReceiveOutcome, Session, SessionConfig, SignConvention};

/// A `Link` over any `Read + Write` pair, polling at the byte granularity
/// the trait requires. Good enough for a file or a pipe; a real serial port
/// would plug into the same trait without touching `serial-proto` itself.
struct StdLink<R, W> {
    reader: R,
    writer: W,
    peeked: Option<u8>,
}

impl<R: Read, W: Write> StdLink<R, W> {
    fn new(reader: R, writer: W) -> Self {
        StdLink {
            reader,
            writer,
            peeked: None,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.peeked.is_none() {
            let mut byte = [0u8; 1];
            if self.reader.read(&mut byte)? == 1 {
                self.peeked = Some(byte[0]);
            }
        }
        Ok(())
    }
}

impl<R: Read, W: Write> Link for StdLink<R, W> {
    type Error = io::Error;

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    fn read_one(&mut self) -> io::Result<Option<u8>> {
        self.fill()?;
        Ok(self.peeked.take())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.fill()?;
        Ok(self.peeked.map_or(0, |_| 1))
    }
}

#[derive(Debug, Clone, Copy)]
struct SignConventionArg(SignConvention);

impl FromStr for SignConventionArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign-magnitude" => Ok(SignConventionArg(SignConvention::SignMagnitude)),
            "twos-complement" => Ok(SignConventionArg(SignConvention::TwosComplement)),
            other => Err(format!(
                "unknown sign convention {:?}; expected \"sign-magnitude\" or \"twos-complement\"",
                other
            )),
        }
    }
}

#[derive(StructOpt, Debug)]
enum Mode {
    /// Encode integers given on the command line into one framed packet.
    Send {
        #[structopt(name = "ITEM")]
        items: Vec<i64>,
    },
    /// Decode framed packets and print each packet's items as they complete.
    Receive {
        #[structopt(long = "--follow", short = "-F", help = "Keep polling after EOF, like `tail -f`.")]
        follow: bool,
    },
}

#[derive(StructOpt, Debug)]
#[structopt(
    about = "Encodes and decodes the serial-proto framed integer protocol, for manual testing against a file or a pipe. Both ends of a link must agree on --sign-convention."
)]
struct Opt {
    #[structopt(
        name = "FILE",
        parse(from_os_str),
        help = "Path to read from (receive) or write to (send). Defaults to stdin/stdout."
    )]
    file: Option<PathBuf>,

    #[structopt(long = "--sign-convention", default_value = "sign-magnitude")]
    sign_convention: SignConventionArg,

    #[structopt(long = "--max-items", default_value = "64")]
    max_items: usize,

    #[structopt(long = "--fold-corrupt", help = "Silently reset on a corrupt byte instead of reporting it.")]
    fold_corrupt: bool,

    #[structopt(subcommand)]
    mode: Mode,
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let config = SessionConfig {
        sign_convention: opt.sign_convention.0,
        max_items_per_packet: opt.max_items,
        corrupt_policy: if opt.fold_corrupt {
            CorruptPolicy::FoldIntoPending
        } else {
            CorruptPolicy::Surface
        },
    };

    match opt.mode {
        Mode::Send { items } => send(&opt.file, config, &items),
        Mode::Receive { follow } => receive(&opt.file, config, opt.max_items, follow),
    }
}

fn send(file: &Option<PathBuf>, config: SessionConfig, items: &[i64]) -> Result<()> {
    let writer: Box<dyn Write> = match file {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };

    let link = StdLink::new(io::empty(), writer);
    let mut session = Session::open(link, config);
    session.send(items).context("failed to send packet")?;
    Ok(())
}

fn receive(file: &Option<PathBuf>, config: SessionConfig, max_items: usize, follow: bool) -> Result<()> {
    let reader: Box<dyn Read> = match file {
        Some(path) => {
            Box::new(File::open(path).with_context(|| format!("failed to open {}", path.display()))?)
        }
        None => Box::new(io::stdin()),
    };

    let link = StdLink::new(reader, io::sink());
    let mut session = Session::open(link, config);
    let mut buffer = vec![0i32; max_items];

    loop {
        match session.receive(&mut buffer).context("link error while receiving")? {
            ReceiveOutcome::Complete { count } => println!("{:?}", &buffer[..count]),
            ReceiveOutcome::Overflow => warn!("packet exceeded {} items; discarded", max_items),
            ReceiveOutcome::Corrupt => warn!("corrupt byte on wire; receiver reset"),
            ReceiveOutcome::Pending => {
                if follow {
                    thread::sleep(Duration::from_millis(10));
                } else {
                    break;
                }
            }
        }
    }

    Ok(())
}
