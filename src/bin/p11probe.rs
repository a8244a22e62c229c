use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use tracing::info;

use p11probe::api::{
    AttributeType, MechanismType, ObjectClass, ObjectHandle, Pin, SlotId, Ulong,
};
use p11probe::ports::CredentialSource;
use p11probe::use_cases::{class_passes, DumpTarget, OutputSpec, SessionConfig};
use p11probe::{Harness, Pkcs11Module, SignRequest, StaticCredential, TerminalPrompt, VerifyRequest};

const DEFAULT_MODULE: &str = ".libs/keychain-pkcs11.so";

#[derive(Parser, Debug)]
#[command(name = "p11probe")]
#[command(about = "Inspect and exercise a PKCS#11 module", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Path of the PKCS#11 module to load
    #[arg(env = "P11PROBE_MODULE", default_value = DEFAULT_MODULE)]
    pub module: String,

    /// Slot to use (default: first slot)
    #[arg(long)]
    pub slot: Option<Ulong>,

    /// Also list slots that hold no token
    #[arg(long)]
    pub allow_empty_slots: bool,

    /// Do not log in to the token
    #[arg(long)]
    pub no_login: bool,

    /// User PIN; prompted for on the terminal when not given
    #[arg(long, env = "P11PROBE_PIN", hide_env_values = true)]
    pub pin: Option<String>,

    /// Object handle to inspect, dump, sign or verify with
    #[arg(long)]
    pub object: Option<Ulong>,

    /// Only enumerate objects of this class (name or number)
    #[arg(long, value_parser = ObjectClass::parse)]
    pub class: Option<ObjectClass>,

    /// After the full walk, list X.509 certificates, public keys, private
    /// keys and vendor-defined objects in separate passes
    #[arg(long, conflicts_with = "object")]
    pub class_passes: bool,

    /// Attribute to dump from --object (name or number, repeatable)
    #[arg(
        long = "attribute",
        value_parser = AttributeType::parse,
        requires = "object",
        requires = "dump_output"
    )]
    pub attributes: Vec<AttributeType>,

    /// File to dump a single attribute value to
    #[arg(long, group = "dump_output")]
    pub output: Option<PathBuf>,

    /// Filename template for dumps: %o object, %a attribute, %s slot, %% literal %
    #[arg(long, group = "dump_output")]
    pub output_template: Option<String>,

    /// Text to sign
    #[arg(long, conflicts_with = "sign_zeros")]
    pub sign: Option<String>,

    /// Sign this many NUL bytes
    #[arg(long)]
    pub sign_zeros: Option<usize>,

    /// Signing or verification mechanism (default: CKM_RSA_PKCS)
    #[arg(long, value_parser = MechanismType::parse)]
    pub mechanism: Option<MechanismType>,

    /// File holding the data a detached signature covers
    #[arg(long, requires = "verify_signature")]
    pub verify_data: Option<PathBuf>,

    /// File holding the detached signature
    #[arg(long, requires = "verify_data")]
    pub verify_signature: Option<PathBuf>,

    /// After cleaning up, wait for Control-C before exiting
    #[arg(long)]
    pub wait: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            slot: self.slot.map(SlotId),
            require_token: !self.allow_empty_slots,
            login: !self.no_login,
        }
    }

    fn credentials(&self) -> anyhow::Result<Box<dyn CredentialSource>> {
        Ok(match &self.pin {
            Some(pin) => Box::new(StaticCredential::new(
                Pin::from_str(pin).context("invalid PIN")?,
            )),
            None => Box::new(TerminalPrompt),
        })
    }

    fn object(&self) -> Option<ObjectHandle> {
        self.object.map(ObjectHandle)
    }

    fn mechanism(&self) -> MechanismType {
        self.mechanism.unwrap_or_else(MechanismType::default_signing)
    }

    fn dump_target(&self) -> Option<DumpTarget> {
        let object = self.object()?;
        if self.attributes.is_empty() {
            return None;
        }
        let output = match (&self.output, &self.output_template) {
            (Some(path), _) => OutputSpec::File(path.clone()),
            (None, Some(template)) => OutputSpec::Template(template.clone()),
            (None, None) => return None,
        };
        Some(DumpTarget {
            object,
            attributes: self.attributes.clone(),
            output,
        })
    }

    fn sign_message(&self) -> Option<Vec<u8>> {
        match (&self.sign, self.sign_zeros) {
            (Some(text), _) => Some(text.as_bytes().to_vec()),
            (None, Some(count)) => Some(vec![0; count]),
            (None, None) => None,
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut harness = p11probe::open_module(&cli.module)
        .with_context(|| format!("failed to load module {}", cli.module))?;

    let mut credentials = cli.credentials()?;
    let report = p11probe::open_session(&mut harness, &cli.session_config(), credentials.as_mut())
        .context("failed to open a session")?;
    print!("{}", report);

    let mut acted = false;

    if let Some(target) = cli.dump_target() {
        acted = true;
        for record in p11probe::dump_attributes(&mut harness, &target)
            .context("failed to dump attributes")?
        {
            println!("{}", record);
        }
    }

    if let Some(message) = cli.sign_message() {
        acted = true;
        sign(&mut harness, cli, message)?;
    }

    if let (Some(data), Some(signature)) = (&cli.verify_data, &cli.verify_signature) {
        acted = true;
        let request = VerifyRequest {
            key: cli.object(),
            mechanism: cli.mechanism(),
            data: std::fs::read(data).with_context(|| format!("failed to read {:?}", data))?,
            signature: std::fs::read(signature)
                .with_context(|| format!("failed to read {:?}", signature))?,
        };
        let verdict = p11probe::verify_signature(&mut harness, &request)
            .context("failed to verify signature")?;
        if !verdict.is_good() {
            bail!("signature did not verify: {}", verdict);
        }
        println!("Signature was good!");
    }

    if !acted {
        match cli.object() {
            Some(object) => print!(
                "{}",
                p11probe::report_object(&mut harness, object)
                    .context("failed to inspect object")?
            ),
            None => {
                let count = p11probe::report_objects(&mut harness, cli.class, |object| {
                    print!("{}", object)
                })
                .context("failed to enumerate objects")?;
                println!("Found {} objects", count);
                if cli.class_passes {
                    report_class_passes(&mut harness)?;
                }
            }
        }
    }

    harness.teardown().context("failed to clean up")?;
    info!("Done");
    Ok(())
}

fn sign(harness: &mut Harness<Pkcs11Module>, cli: &Cli, message: Vec<u8>) -> anyhow::Result<()> {
    let request = SignRequest {
        key: cli.object(),
        mechanism: cli.mechanism(),
        message,
    };
    let result = p11probe::sign_and_verify(harness, &request).context("signing failed")?;
    println!(
        "Signature size = {}, data = {}",
        result.signature.len(),
        hex::encode(&result.signature)
    );
    if !result.verdict.is_good() {
        bail!(
            "signature did not verify with public key {}: {}",
            result.public_key,
            result.verdict
        );
    }
    println!("Signature verified with public key {}", result.public_key);
    Ok(())
}

fn report_class_passes(harness: &mut Harness<Pkcs11Module>) -> anyhow::Result<()> {
    for pass in class_passes() {
        println!("{}:", pass.title);
        let count = p11probe::report_pass(harness, &pass, |object| print!("{}", object))
            .with_context(|| format!("failed to list {}", pass.title.to_lowercase()))?;
        println!("Found {} objects", count);
    }
    Ok(())
}

#[cfg(unix)]
fn wait_for_interrupt() -> anyhow::Result<()> {
    eprintln!("Waiting for Control-C");
    // SIGINT is blocked and then taken synchronously, so it never runs the
    // default handler
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        if libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) != 0 {
            bail!("failed to block SIGINT");
        }
        let mut signal = 0;
        if libc::sigwait(&set, &mut signal) != 0 {
            bail!("failed to wait for SIGINT");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_interrupt() -> anyhow::Result<()> {
    bail!("--wait is only supported on Unix")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    let result = run(&cli);
    if cli.wait {
        wait_for_interrupt()?;
    }
    result
}
