#![forbid(unsafe_code)]

//! bankws CLI: sign, verify and inspect bank web-service messages.

use bankws::c14n::C14nMode;
use bankws::crl::config::{DEFAULT_CACHE_PATH, DEFAULT_CRL_URL};
use bankws::crl::{RevocationCheck, RevocationChecker};
use bankws::xml::{id, IdAttr, XmlDocument};
use bankws::{DsigContext, Error, RevocationConfig, SignOptions, SigningProfile, VerifyResult};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "bankws",
    about = "bankws: XML-DSig signing and validation for bank web services",
    version
)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign an XML document
    Sign {
        /// Input XML file
        file: PathBuf,

        /// RSA private key (PEM or DER, PKCS#1 or PKCS#8)
        #[arg(short = 'k', long)]
        key: PathBuf,

        /// X.509 certificate (DER or PEM)
        #[arg(short = 'c', long)]
        cert: PathBuf,

        /// Signing profile
        #[arg(long, value_enum, default_value_t = Profile::Application)]
        profile: Profile,

        /// Canonicalization (default: the profile's)
        #[arg(long, value_enum)]
        c14n: Option<Mode>,

        /// Prefix the output with an XML declaration
        #[arg(long = "xml-declaration")]
        xml_declaration: bool,

        /// Lifetime of a newly created wsu:Timestamp, in seconds
        #[arg(long = "timestamp-validity", default_value_t = 300)]
        timestamp_validity: u64,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a signed XML document
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Register additional ID attributes ({namespace}local or local)
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        #[command(flatten)]
        crl: CrlArgs,
    },

    /// Show a certificate's serial, subject, expiry and renewal status
    CertInfo {
        /// X.509 certificate (DER or PEM)
        cert: PathBuf,
    },

    /// Print the canonical form of a document or element, and its SHA-1
    C14n {
        /// Input XML file
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Mode::Inclusive)]
        mode: Mode,

        /// Canonicalize only the element carrying this ID
        #[arg(long)]
        id: Option<String>,

        /// InclusiveNamespaces PrefixList for exclusive modes
        #[arg(long = "prefix-list", value_delimiter = ' ')]
        prefix_list: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the cached certificate revocation list
    Crl {
        #[command(subcommand)]
        action: CrlCommand,
    },
}

#[derive(Subcommand)]
enum CrlCommand {
    /// Download the CRL now and replace the cache
    Refresh {
        #[command(flatten)]
        crl: CrlArgs,
    },
    /// Check whether a certificate is revoked
    Check {
        /// X.509 certificate (DER or PEM)
        cert: PathBuf,

        #[command(flatten)]
        crl: CrlArgs,
    },
}

#[derive(Args)]
struct CrlArgs {
    /// CRL endpoint
    #[arg(long = "crl-url", env = "BANKWS_CRL_URL", default_value = DEFAULT_CRL_URL)]
    crl_url: String,

    /// CRL cache file
    #[arg(long = "crl-cache", env = "BANKWS_CRL_CACHE", default_value = DEFAULT_CACHE_PATH)]
    crl_cache: PathBuf,

    /// CRL download timeout, in seconds
    #[arg(long = "crl-timeout", default_value_t = 30)]
    crl_timeout: u64,

    /// Treat certificates as revoked while no CRL has ever been obtained
    #[arg(long = "fail-closed")]
    fail_closed: bool,
}

impl CrlArgs {
    fn config(&self) -> RevocationConfig {
        RevocationConfig {
            crl_url: self.crl_url.clone(),
            cache_path: self.crl_cache.clone(),
            fetch_timeout: Duration::from_secs(self.crl_timeout),
            fail_closed: self.fail_closed,
            ..RevocationConfig::default()
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Profile {
    /// Whole-document signature with an embedded certificate
    Application,
    /// SOAP Body and Timestamp, BinarySecurityToken
    WsSecurity,
}

impl From<Profile> for SigningProfile {
    fn from(p: Profile) -> Self {
        match p {
            Profile::Application => SigningProfile::Application,
            Profile::WsSecurity => SigningProfile::WsSecurity,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Inclusive,
    InclusiveWithComments,
    Exclusive,
    ExclusiveWithComments,
}

impl From<Mode> for C14nMode {
    fn from(m: Mode) -> Self {
        match m {
            Mode::Inclusive => C14nMode::Inclusive,
            Mode::InclusiveWithComments => C14nMode::InclusiveWithComments,
            Mode::Exclusive => C14nMode::Exclusive,
            Mode::ExclusiveWithComments => C14nMode::ExclusiveWithComments,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = match cli.command {
        Commands::Sign {
            file,
            key,
            cert,
            profile,
            c14n,
            xml_declaration,
            timestamp_validity,
            output,
        } => {
            let options = SignOptions {
                c14n_mode: c14n.map(C14nMode::from),
                xml_declaration,
                timestamp_validity: Duration::from_secs(timestamp_validity),
            };
            cmd_sign(&file, &key, &cert, profile.into(), &options, output)
        }
        Commands::Verify { file, id_attr, crl } => cmd_verify(&file, &id_attr, crl.config()),
        Commands::CertInfo { cert } => cmd_cert_info(&cert),
        Commands::C14n {
            file,
            mode,
            id,
            prefix_list,
            output,
        } => cmd_c14n(&file, mode.into(), id.as_deref(), &prefix_list, output),
        Commands::Crl { action } => match action {
            CrlCommand::Refresh { crl } => cmd_crl_refresh(crl.config()),
            CrlCommand::Check { cert, crl } => cmd_crl_check(&cert, crl.config()),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn cmd_sign(
    file: &Path,
    key: &Path,
    cert: &Path,
    profile: SigningProfile,
    options: &SignOptions,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let document = read_file(file)?;
    let signed = bankws::sign(&document, key, cert, profile, options)?;
    write_output(output, &signed)
}

fn cmd_verify(file: &Path, id_attrs: &[String], config: RevocationConfig) -> Result<(), Error> {
    let document = read_file(file)?;
    let mut ctx = DsigContext::with_revocation_config(config);
    ctx.debug = log::log_enabled!(log::Level::Debug);
    for attr in id_attrs {
        ctx.add_id_attr(attr);
    }

    let reason = match bankws::dsig::verify(&ctx, &document) {
        Ok(VerifyResult::Valid) => {
            println!("OK");
            return Ok(());
        }
        Ok(VerifyResult::Invalid { cause }) => cause.to_string(),
        Err(e) => e.to_string(),
    };
    eprintln!("INVALID: {reason}");
    process::exit(1);
}

fn cmd_cert_info(path: &Path) -> Result<(), Error> {
    let der = bankws::keys::loader::load_certificate_file(path)?;
    let info = bankws::keys::x509::certificate_info(&der)?;
    println!("Serial:    {}", info.serial);
    println!("Subject:   {}", info.subject);
    println!("Not after: {}", info.not_after.format("%Y-%m-%d %H:%M:%S UTC"));
    let status = match bankws::keys::x509::check_renewable(&der, chrono::Utc::now()) {
        Ok(true) => "due (expires within the renewal window)".to_owned(),
        Ok(false) => "not due".to_owned(),
        Err(e) => e.to_string(),
    };
    println!("Renewal:   {status}");
    Ok(())
}

fn cmd_c14n(
    file: &Path,
    mode: C14nMode,
    id: Option<&str>,
    prefix_list: &[String],
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let doc = XmlDocument::parse_bytes(&read_file(file)?)?;
    let apex = id
        .map(|id| id::resolve_id(&doc, &IdAttr::defaults(), id))
        .transpose()?;
    let canonical = bankws::c14n::canonicalize(&doc, apex, mode, prefix_list)?;
    eprintln!("SHA1: {}", bankws::crypto::digest::sha1_base64(&canonical));
    write_output(output, &canonical)
}

fn cmd_crl_refresh(config: RevocationConfig) -> Result<(), Error> {
    let checker = RevocationChecker::from_config(config);
    let crl = checker.force_refresh()?;
    println!(
        "Cached {} bytes from {} at {}",
        crl.len(),
        checker.config().crl_url,
        checker.config().cache_path.display()
    );
    Ok(())
}

fn cmd_crl_check(cert: &Path, config: RevocationConfig) -> Result<(), Error> {
    let der = bankws::keys::loader::load_certificate_file(cert)?;
    let checker = RevocationChecker::from_config(config);
    if checker.is_revoked(&der)? {
        println!("REVOKED");
        process::exit(1);
    }
    println!("not revoked");
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => {
            std::fs::write(&p, data).map_err(|e| Error::Other(format!("{}: {e}", p.display())))
        }
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(data)
                .map_err(|e| Error::Other(format!("stdout: {e}")))
        }
    }
}
