use anyhow::{Context, Result, bail};
use std::fmt::Display;
use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const REAP_TIMEOUT: Duration = Duration::from_millis(500);
const MAX_OUTPUT_BYTES: u64 = 64 * 1024;

/// Try each provider in order and return the first success, along with the
/// provider that produced it. Failures are logged and skipped.
pub fn first_success<'a, P, T, E>(
    providers: impl IntoIterator<Item = &'a P>,
    mut attempt: impl FnMut(&'a P) -> Result<T, E>,
) -> Option<(&'a P, T)>
where
    P: ?Sized + 'a,
    E: Display,
{
    for provider in providers {
        match attempt(provider) {
            Ok(value) => return Some((provider, value)),
            Err(err) => debug!("provider failed, trying next: {err:#}"),
        }
    }
    None
}

/// Run `argv` (plus `extra`) with a deadline. Returns the exit status and
/// the trimmed stdout. A child still running at the deadline is killed
/// and reported as an error.
fn run_bounded(
    argv: &[String],
    extra: Option<&str>,
    timeout: Duration,
) -> Result<(ExitStatus, String)> {
    let Some((program, args)) = argv.split_first() else {
        bail!("empty command");
    };
    let mut child = Command::new(program)
        .args(args)
        .args(extra)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("running {program}"))?;

    // Drain stdout on a helper thread so a chatty child never blocks on
    // a full pipe. Only the head is kept.
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut output = Vec::new();
            let _ = stdout.by_ref().take(MAX_OUTPUT_BYTES).read_to_end(&mut output);
            let _ = io::copy(&mut stdout, &mut io::sink());
            output
        })
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                reap(&mut child);
                bail!("{program} timed out after {timeout:?}");
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(err) => {
                reap(&mut child);
                return Err(err).with_context(|| format!("waiting for {program}"));
            }
        }
    };

    // A descendant may still hold the pipe open; give up on the output at
    // the deadline rather than wait for it.
    let mut output = Vec::new();
    if let Some(handle) = reader {
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }
        if handle.is_finished() {
            output = handle.join().unwrap_or_default();
        }
    }
    Ok((status, String::from_utf8_lossy(&output).trim().to_string()))
}

/// Kill `child` and wait a bounded time for it to exit.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let deadline = Instant::now() + REAP_TIMEOUT;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Ok(Some(_)) | Err(_) => return,
        }
    }
    warn!(pid = child.id(), "child did not exit after kill");
}

/// Something that can speak a message out loud.
pub trait Announcer {
    fn name(&self) -> &str;
    fn announce(&self, message: &str) -> Result<()>;
}

/// Runs an external program with the message as its last argument.
pub struct CommandAnnouncer {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandAnnouncer {
    /// `None` for an empty argv.
    pub fn new(argv: Vec<String>, timeout: Duration) -> Option<Self> {
        (!argv.is_empty()).then_some(Self { argv, timeout })
    }
}

impl Announcer for CommandAnnouncer {
    fn name(&self) -> &str {
        &self.argv[0]
    }

    fn announce(&self, message: &str) -> Result<()> {
        let (status, _) = run_bounded(&self.argv, Some(message), self.timeout)?;
        if !status.success() {
            bail!("{} exited with {status}", self.argv[0]);
        }
        Ok(())
    }
}

/// Announcers configured as argv lists, in priority order.
pub fn from_commands(commands: &[Vec<String>], timeout: Duration) -> Vec<Box<dyn Announcer>> {
    commands
        .iter()
        .filter_map(|argv| CommandAnnouncer::new(argv.clone(), timeout))
        .map(|a| Box::new(a) as Box<dyn Announcer>)
        .collect()
}

/// Speak `message` with the first announcer that works. Returns the name
/// of the one that did, or `None` when all failed (or none are configured).
pub fn announce<'a>(announcers: &'a [Box<dyn Announcer>], message: &str) -> Option<&'a str> {
    let spoken = first_success(announcers.iter().map(|a| a.as_ref()), |a| {
        a.announce(message)
            .with_context(|| format!("announcer {}", a.name()))
    });
    match spoken {
        Some((announcer, ())) => Some(announcer.name()),
        None => {
            if !announcers.is_empty() {
                warn!("no announcer succeeded");
            }
            None
        }
    }
}

/// Writes a short free-form completion sentence, e.g. by asking a model.
pub trait PhraseGenerator {
    fn name(&self) -> &str;
    fn generate(&self) -> Result<String>;
}

/// Runs an external program and takes its trimmed stdout as the phrase.
/// A non-zero exit or blank output counts as a failure.
pub struct CommandGenerator {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandGenerator {
    /// `None` for an empty argv.
    pub fn new(argv: Vec<String>, timeout: Duration) -> Option<Self> {
        (!argv.is_empty()).then_some(Self { argv, timeout })
    }
}

impl PhraseGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.argv[0]
    }

    fn generate(&self) -> Result<String> {
        let (status, output) = run_bounded(&self.argv, None, self.timeout)?;
        if !status.success() {
            bail!("{} exited with {status}", self.argv[0]);
        }
        if output.is_empty() {
            bail!("{} printed nothing", self.argv[0]);
        }
        Ok(output)
    }
}

/// Phrase generators configured as argv lists, in priority order.
pub fn generators_from_commands(
    commands: &[Vec<String>],
    timeout: Duration,
) -> Vec<Box<dyn PhraseGenerator>> {
    commands
        .iter()
        .filter_map(|argv| CommandGenerator::new(argv.clone(), timeout))
        .map(|g| Box::new(g) as Box<dyn PhraseGenerator>)
        .collect()
}

/// The first non-blank phrase any generator produces.
pub fn generate_phrase(generators: &[Box<dyn PhraseGenerator>]) -> Option<String> {
    let generated = first_success(generators.iter().map(|g| g.as_ref()), |g| {
        g.generate()
            .map(|phrase| phrase.trim().to_string())
            .and_then(|phrase| {
                if phrase.is_empty() {
                    bail!("blank phrase")
                } else {
                    Ok(phrase)
                }
            })
            .with_context(|| format!("generator {}", g.name()))
    });
    generated.map(|(generator, phrase)| {
        debug!(generator = generator.name(), "generated completion phrase");
        phrase
    })
}
