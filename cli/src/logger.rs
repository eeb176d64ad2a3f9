use file_rotate::{FileRotate, RotationMode};
use parking_lot::Mutex;
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Clone)]
struct TracingWriter {
    file_rotate: Arc<Mutex<FileRotate>>,
}

impl TracingWriter {
    fn new(file_rotate: Arc<Mutex<FileRotate>>) -> Self {
        TracingWriter { file_rotate }
    }
}

impl io::Write for TracingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file_rotate.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file_rotate.lock().flush()
    }
}

pub fn setup_logger(log_path: Option<&str>) -> Result<(), Box<dyn Error>> {
    let env_filter = EnvFilter::new("namesys=debug")
        .add_directive("dnslink=debug".parse()?)
        .add_directive("store=info".parse()?)
        .add_directive("config=info".parse()?)
        .add_directive("cli=debug".parse()?);

    if let Some(log_path) = log_path {
        if let Some(path) = PathBuf::from(log_path).parent() {
            std::fs::create_dir_all(path)?;
        }
        let logger = Arc::new(Mutex::new(FileRotate::new(
            log_path,
            RotationMode::Lines(100_000),
            20,
        )));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(move || TracingWriter::new(logger.clone()))
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .compact()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    };

    #[cfg(debug_assertions)]
    {
        use parking_lot::deadlock;
        use std::thread;
        use std::time::Duration;

        // Background thread checking for deadlocks every 10s
        thread::spawn(move || loop {
            thread::sleep(Duration::from_secs(10));
            let deadlocks = deadlock::check_deadlock();
            if deadlocks.is_empty() {
                continue;
            }

            eprintln!("{} deadlocks detected", deadlocks.len());
            for (i, threads) in deadlocks.iter().enumerate() {
                eprintln!("Deadlock #{}", i);
                for t in threads {
                    eprintln!("Thread Id {:#?}", t.thread_id());
                    eprintln!("{:#?}", t.backtrace());
                }
            }
        });
    }
    Ok(())
}
