//! Stream a file or stdin through a converter into stdout
//!
//! Input is read in chunks, converted as it arrives and written out in order.
//! Reading pauses while too many writes are outstanding on stdout.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use charsets::Converter;
use clap::Parser;
use iokernel::{
    is_congested, EventLoop, Handle, IoError, KernelConfig, ReadCallback, ReadChunk, StreamHandle,
};
use parking_lot::Mutex;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "transcode")]
#[command(about = "Convert a byte stream from one encoding to another")]
struct Args {
    /// Encoding of the input
    #[arg(short, long, default_value = "utf8")]
    from: String,

    /// Encoding of the output
    #[arg(short, long, default_value = "utf8")]
    to: String,

    /// Kernel settings as JSON
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail on malformed or unmappable input instead of substituting
    #[arg(long)]
    strict: bool,

    /// Input file; stdin when absent
    input: Option<PathBuf>,
}

struct Pump {
    input: Weak<StreamHandle>,
    output: Arc<StreamHandle>,
    converter: Mutex<Converter>,
    high_water_mark: usize,
    paused: AtomicBool,
    finished: AtomicBool,
    failed: AtomicBool,
}

impl Pump {
    fn reader(self: &Arc<Self>) -> ReadCallback {
        let pump = Arc::clone(self);
        Box::new(move |item| pump.on_read(item))
    }

    fn on_read(self: &Arc<Self>, item: Result<ReadChunk, IoError>) {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(err) => {
                error!(error = %err, "read failed");
                self.fail();
                return;
            }
        };
        let last = chunk.is_eof();
        let input = (!last).then_some(chunk.data.as_slice());
        let converted = self.converter.lock().convert(input, last);
        match converted {
            Ok(out) if last => self.finish(out),
            Ok(out) if out.is_empty() => {}
            Ok(out) => self.write(out),
            Err(err) => {
                error!(code = err.code(), error = %err, "conversion failed");
                self.fail();
            }
        }
    }

    fn write(self: &Arc<Self>, data: Vec<u8>) {
        let pump = Arc::clone(self);
        let queued = self.output.write(
            data,
            Box::new(move |result| match result {
                Ok(_) => pump.resume_if_drained(),
                Err(err) => {
                    error!(code = err.error.code(), error = %err, "write failed");
                    pump.fail();
                }
            }),
        );
        if let Err(err) = queued {
            error!(error = %err, "write rejected");
            self.fail();
            return;
        }
        if is_congested(&*self.output, self.high_water_mark) {
            self.pause();
        }
    }

    /// Queue the tail; stdout closes once everything before it is out
    fn finish(self: &Arc<Self>, tail: Vec<u8>) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(input) = self.input.upgrade() {
            input.close();
        }
        let output = Arc::clone(&self.output);
        let pump = Arc::clone(self);
        let queued = self.output.write(
            tail,
            Box::new(move |result| {
                if let Err(err) = result {
                    error!(code = err.error.code(), error = %err, "final write failed");
                    pump.failed.store(true, Ordering::SeqCst);
                }
                output.close();
            }),
        );
        if let Err(err) = queued {
            error!(error = %err, "final write rejected");
            self.failed.store(true, Ordering::SeqCst);
            self.output.close();
        }
    }

    fn fail(self: &Arc<Self>) {
        self.failed.store(true, Ordering::SeqCst);
        if let Some(input) = self.input.upgrade() {
            input.stop_reading();
        }
        self.finish(Vec::new());
    }

    fn pause(&self) {
        if let Some(input) = self.input.upgrade() {
            if !self.paused.swap(true, Ordering::SeqCst) {
                debug!(outstanding = self.output.writes_outstanding(), "pausing input");
                input.stop_reading();
            }
        }
    }

    fn resume_if_drained(self: &Arc<Self>) {
        if self.finished.load(Ordering::SeqCst)
            || is_congested(&*self.output, self.high_water_mark)
            || !self.paused.swap(false, Ordering::SeqCst)
        {
            return;
        }
        let Some(input) = self.input.upgrade() else {
            return;
        };
        debug!("resuming input");
        if let Err(err) = input.start_reading(self.reader()) {
            error!(error = %err, "cannot resume reading");
            self.fail();
        }
    }
}

async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => KernelConfig::from_reader(std::fs::File::open(path)?)?,
        None => KernelConfig::default(),
    };
    if args.strict {
        config.strict_conversions = true;
    }

    let mut event_loop = EventLoop::new();
    let ctx = config.context(event_loop.handle())?;
    let converter = Converter::open_with(
        &ctx.charsets,
        &args.from,
        &args.to,
        config.convert_options(),
    )?;

    let input = Arc::new(match &args.input {
        Some(path) => StreamHandle::from_file(&ctx, tokio::fs::File::open(path).await?),
        None => StreamHandle::stdin(&ctx),
    });
    let output = Arc::new(StreamHandle::stdout(&ctx));
    info!(from = %converter.from(), to = %converter.to(), "transcoding");

    let pump = Arc::new(Pump {
        input: Arc::downgrade(&input),
        output: Arc::clone(&output),
        converter: Mutex::new(converter),
        high_water_mark: config.write_high_water_mark,
        paused: AtomicBool::new(false),
        finished: AtomicBool::new(false),
        failed: AtomicBool::new(false),
    });
    input.start_reading(pump.reader())?;

    event_loop.run_until_idle().await;
    input.close();
    output.close();
    Ok(!pump.failed.load(Ordering::SeqCst))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let code = match run(args).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(err) => {
            error!(error = %err, "transcode failed");
            2
        }
    };
    // a pending stdin read would hold up runtime shutdown
    std::process::exit(code);
}
