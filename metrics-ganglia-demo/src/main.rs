use getopts::{Matches, Options};
use log::{error, info};
use metrics_exporter_ganglia::{Counter, GangliaBuilder, Histogram, LoggingSink, Meter, Timer};
use rand::Rng;
use std::{
    env,
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

const GROUP: &str = "gmrtest";

/// A pretend request handler, instrumented the way a real one would be.
struct Server {
    max_size: u64,
    max_sleep: Duration,
    concurrent_requests: Counter,
    num_requests: Meter,
    response_time: Timer,
    page_size: Histogram,
}

impl Server {
    fn new(max_size: u64, max_sleep: Duration) -> Server {
        Server {
            max_size,
            max_sleep,
            concurrent_requests: Counter::new("concurrent_requests")
                .with_title("Number of concurrent requests")
                .with_units("requests")
                .with_groups([GROUP]),
            num_requests: Meter::new("num_requests")
                .with_title("Number of requests")
                .with_units("requests")
                .with_groups([GROUP]),
            response_time: Timer::new("response_time")
                .with_resolution(Duration::from_millis(1))
                .with_title("Response time")
                .with_groups([GROUP]),
            page_size: Histogram::new("page_size")
                .with_title("Page size")
                .with_units("bytes")
                .with_groups([GROUP]),
        }
    }

    fn handle_request(&self) {
        let _timing = self.response_time.start();
        self.concurrent_requests.increment(1);
        self.num_requests.mark(1);

        let mut rng = rand::rng();
        let max_sleep_ms = self.max_sleep.as_millis() as u64;
        thread::sleep(Duration::from_millis(rng.random_range(0..=max_sleep_ms)));

        let size = rng.random_range(0..=self.max_size);
        self.page_size.update(i64::try_from(size).unwrap_or(i64::MAX));

        self.concurrent_requests.decrement(1);
    }
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

pub fn opts() -> Options {
    let mut opts = Options::new();

    opts.optopt("", "prefix", "prefix for every metric name (default: gmrtest)", "STRING");
    opts.optopt("", "separator", "separator between name parts (default: .)", "STRING");
    opts.optopt("t", "tick", "seconds between exports (default: 20)", "INTEGER");
    opts.optopt("w", "workers", "number of request workers (default: 4)", "INTEGER");
    opts.optopt("d", "duration", "number of seconds to run, 0 to run forever (default: 60)", "INTEGER");
    opts.optopt("", "max-sleep", "maximum simulated request time in milliseconds (default: 5000)", "INTEGER");
    opts.optopt("", "max-size", "maximum simulated page size in bytes (default: 4096)", "INTEGER");
    opts.optflag("h", "help", "print this help menu");

    opts
}

fn parse_opt<T: FromStr>(matches: &Matches, name: &str, default: T) -> Result<T, String> {
    match matches.opt_str(name) {
        Some(value) => value.parse().map_err(|_| format!("invalid value for --{}: {}", name, value)),
        None => Ok(default),
    }
}

fn main() {
    pretty_env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = &args[0];
    let opts = opts();

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            error!("Failed to parse command line args: {}", f);
            return;
        }
    };

    if matches.opt_present("help") {
        print_usage(program, &opts);
        return;
    }

    let parsed = (|| {
        Ok::<_, String>((
            parse_opt(&matches, "tick", 20u64)?,
            parse_opt(&matches, "workers", 4usize)?,
            parse_opt(&matches, "duration", 60u64)?,
            parse_opt(&matches, "max-sleep", 5000u64)?,
            parse_opt(&matches, "max-size", 4096u64)?,
        ))
    })();
    let (tick, workers, seconds, max_sleep, max_size) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    let prefix = matches.opt_str("prefix").unwrap_or_else(|| GROUP.to_owned());
    let separator = matches.opt_str("separator").unwrap_or_else(|| ".".to_owned());

    info!("metrics ganglia demo");
    info!("prefix: {:?}", prefix);
    info!("tick: {}s", tick);
    info!("workers: {}", workers);

    let registry = match GangliaBuilder::default()
        .with_prefix(prefix)
        .with_name_separator(separator)
        .with_tick_interval(Duration::from_secs(tick))
        .build(LoggingSink::default())
    {
        Ok(registry) => registry,
        Err(e) => {
            error!("Failed to build registry: {}", e);
            return;
        }
    };

    let server = Arc::new(Server::new(max_size, Duration::from_millis(max_sleep)));
    registry.register(&server.concurrent_requests);
    registry.register(&server.num_requests);
    registry.register(&server.response_time);
    registry.register(&server.page_size);

    info!("registered {} metrics", registry.len());

    // Spin up our request workers.
    let done = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::new();

    for _ in 0..workers {
        let done = Arc::clone(&done);
        let server = Arc::clone(&server);
        let handle = thread::spawn(move || {
            while !done.load(Ordering::Relaxed) {
                server.handle_request();
            }
        });

        handles.push(handle);
    }

    let mut elapsed = 0;
    while seconds == 0 || elapsed < seconds {
        thread::sleep(Duration::new(1, 0));
        elapsed += 1;

        info!(
            "requests: {} ({:.2}/sec), in flight: {}",
            server.num_requests.count(),
            server.num_requests.rate_mean(),
            server.concurrent_requests.count()
        );
    }

    info!("--------------------------------------------------------------------------------");
    info!(" requests total: {}", server.num_requests.count());
    if let (Some(mean), Some(max)) = (server.response_time.mean(), server.response_time.max()) {
        info!(" response time: mean: {:?} max: {:?}", mean, max);
    }
    if let (Some(mean), Some(max)) = (server.page_size.mean(), server.page_size.max()) {
        info!(" page size: mean: {:.0} max: {}", mean, max);
    }

    // Wait for the workers to finish their last request.
    done.store(true, Ordering::SeqCst);
    for handle in handles {
        if handle.join().is_err() {
            error!("A request worker panicked.");
        }
    }

    // Push the final values before exiting.
    registry.flush();
}
