use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use tpmkeys::api::{self, AuthValue, HashAlg, KeyKind, PersistentHandle};
use tpmkeys::config::{
    default_state_dir, ModuleConfig, DEFAULT_ENCRYPTED_FILE, DEFAULT_KEY_FILE,
    DEFAULT_PUBLIC_KEY_FILE, DEFAULT_SEALED_FILE, DEFAULT_SIGNATURE_FILE, STATE_DIR_ENV,
};
use tpmkeys::files;

#[derive(Parser, Debug)]
#[command(name = "tpmkeys")]
#[command(about = "Key lifecycle and restricted signing on a TPM-style security module", version)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Directory holding the software module's seeds and persistent objects
    #[arg(long, global = true, env = STATE_DIR_ENV, default_value_os_t = default_state_dir())]
    pub state_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a key under the owner storage parent and write its blob
    Create {
        #[arg(long = "type", default_value = "signer")]
        kind: KindArg,

        /// Password required on every use of the key
        #[arg(long)]
        auth: Option<String>,

        #[arg(long, default_value = DEFAULT_KEY_FILE)]
        out: PathBuf,

        /// Where to write the PEM public key, for keys that have one
        #[arg(long, default_value = DEFAULT_PUBLIC_KEY_FILE)]
        public_key: PathBuf,
    },

    /// Load a key blob and print its name
    Load {
        #[arg(long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,
    },

    /// Encrypt with RSA-OAEP against a PEM public key, on the host
    Encrypt {
        #[arg(long, default_value = DEFAULT_PUBLIC_KEY_FILE)]
        public_key: PathBuf,

        /// Input file, `-` for stdin
        #[arg(long = "in", default_value = "-")]
        input: PathBuf,

        /// Output file, `-` for stdout
        #[arg(long, default_value = "-")]
        out: PathBuf,
    },

    /// Decrypt an RSA-OAEP ciphertext with a module key
    Decrypt {
        #[arg(long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,

        #[arg(long)]
        auth: Option<String>,

        #[arg(long = "in", default_value = "-")]
        input: PathBuf,

        #[arg(long, default_value = "-")]
        out: PathBuf,
    },

    /// Sign a message; restricted keys use the module's hash ticket
    Sign {
        #[arg(long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,

        #[arg(long)]
        auth: Option<String>,

        #[arg(long = "in", default_value = "-")]
        input: PathBuf,

        #[arg(long, default_value = DEFAULT_SIGNATURE_FILE)]
        out: PathBuf,
    },

    /// Verify a signature against a PEM public key, on the host
    Verify {
        #[arg(long, default_value = DEFAULT_PUBLIC_KEY_FILE)]
        public_key: PathBuf,

        #[arg(long = "in", default_value = "-")]
        input: PathBuf,

        #[arg(long, default_value = DEFAULT_SIGNATURE_FILE)]
        signature: PathBuf,
    },

    /// Encrypt with a symmetric module key under a fresh IV
    SymEncrypt {
        #[arg(long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,

        #[arg(long)]
        auth: Option<String>,

        #[arg(long = "in", default_value = "-")]
        input: PathBuf,

        #[arg(long, default_value = DEFAULT_ENCRYPTED_FILE)]
        out: PathBuf,
    },

    /// Decrypt a blob written by sym-encrypt
    SymDecrypt {
        #[arg(long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,

        #[arg(long)]
        auth: Option<String>,

        #[arg(long = "in", default_value = DEFAULT_ENCRYPTED_FILE)]
        input: PathBuf,

        #[arg(long, default_value = "-")]
        out: PathBuf,
    },

    /// Seal up to 128 bytes under the owner storage parent
    Seal {
        #[arg(long = "in", default_value = "-")]
        input: PathBuf,

        /// Name algorithm of the sealed object
        #[arg(long, default_value = "sha256")]
        hash: HashArg,

        #[arg(long, default_value = DEFAULT_SEALED_FILE)]
        out: PathBuf,
    },

    /// Release data sealed by seal
    Unseal {
        #[arg(long = "in", default_value = DEFAULT_SEALED_FILE)]
        input: PathBuf,

        #[arg(long, default_value = "-")]
        out: PathBuf,
    },

    /// HMAC under the owner hierarchy, printed as hex
    Hmac {
        #[arg(long, default_value = "sha256")]
        hash: HashArg,

        #[arg(long = "in", default_value = "-")]
        input: PathBuf,
    },

    /// Move a key into a persistent slot
    Persist {
        #[arg(long, default_value = DEFAULT_KEY_FILE)]
        key: PathBuf,

        #[arg(long, default_value = "0x81000010")]
        handle: PersistentHandle,

        /// Keep the key file instead of deleting it once persisted
        #[arg(long)]
        keep_key_file: bool,
    },

    /// Print the PEM public key of a persistent object
    Read {
        #[arg(long, default_value = "0x81000010")]
        handle: PersistentHandle,

        /// Fail unless the slot holds this public key
        #[arg(long)]
        expect: Option<PathBuf>,
    },

    /// Evict a persistent object
    Unpersist {
        #[arg(long, default_value = "0x81000010")]
        handle: PersistentHandle,
    },

    /// Print module properties and persistent handles
    Info,

    /// Discard the module state: new seeds, no persistent objects
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Signer,
    RestrictedSigner,
    Decrypt,
    Symmetric,
}

impl From<KindArg> for KeyKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Signer => KeyKind::Signer,
            KindArg::RestrictedSigner => KeyKind::RestrictedSigner,
            KindArg::Decrypt => KeyKind::Decrypt,
            KindArg::Symmetric => KeyKind::Symmetric,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HashArg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl From<HashArg> for HashAlg {
    fn from(arg: HashArg) -> Self {
        match arg {
            HashArg::Sha1 => HashAlg::Sha1,
            HashArg::Sha256 => HashAlg::Sha256,
            HashArg::Sha384 => HashAlg::Sha384,
            HashArg::Sha512 => HashAlg::Sha512,
        }
    }
}

fn auth_value(auth: Option<String>) -> anyhow::Result<AuthValue> {
    match auth {
        Some(password) => AuthValue::from_str(&password).context("invalid --auth value"),
        None => Ok(AuthValue::empty()),
    }
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    files::read_input(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Writes to `path`, or to stdout when it is `-`.
fn write_output(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data)?;
        stdout.flush()?;
        return Ok(());
    }
    files::write_public(path, data).with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(io::stderr)
        .init();

    let config = ModuleConfig::with_state_dir(&cli.state_dir);

    match cli.command {
        Commands::Create {
            kind,
            auth,
            out,
            public_key,
        } => {
            let info = api::create_key(&config, kind.into(), auth_value(auth)?, &out)
                .context("failed to create key")?;
            if let Some(pem) = &info.public_pem {
                write_output(&public_key, pem.as_bytes())?;
            }
            println!("{}", info.name);
        }

        Commands::Load { key } => {
            let info = api::load_key(&config, &key).context("failed to load key")?;
            println!("{} {}", info.name, info.object_type);
        }

        Commands::Encrypt {
            public_key,
            input,
            out,
        } => {
            let ciphertext = api::encrypt(&public_key, &read(&input)?)
                .context("failed to encrypt")?;
            write_output(&out, &ciphertext)?;
        }

        Commands::Decrypt {
            key,
            auth,
            input,
            out,
        } => {
            let plaintext = api::decrypt(&config, &key, auth_value(auth)?, &read(&input)?)
                .context("failed to decrypt")?;
            write_output(&out, &plaintext)?;
        }

        Commands::Sign {
            key,
            auth,
            input,
            out,
        } => {
            api::sign(&config, &key, auth_value(auth)?, &read(&input)?, &out)
                .context("failed to sign")?;
        }

        Commands::Verify {
            public_key,
            input,
            signature,
        } => {
            let valid = api::verify_signature(&public_key, &read(&input)?, &signature)
                .context("failed to verify")?;
            if !valid {
                bail!("signature does not match");
            }
            println!("signature valid");
        }

        Commands::SymEncrypt {
            key,
            auth,
            input,
            out,
        } => {
            api::sym_encrypt(&config, &key, auth_value(auth)?, &read(&input)?, &out)
                .context("failed to encrypt")?;
        }

        Commands::SymDecrypt {
            key,
            auth,
            input,
            out,
        } => {
            let plaintext = api::sym_decrypt(&config, &key, auth_value(auth)?, &input)
                .context("failed to decrypt")?;
            write_output(&out, &plaintext)?;
        }

        Commands::Seal { input, hash, out } => {
            api::seal(&config, &read(&input)?, hash.into(), &out).context("failed to seal")?;
        }

        Commands::Unseal { input, out } => {
            let data = api::unseal(&config, &input).context("failed to unseal")?;
            write_output(&out, &data)?;
        }

        Commands::Hmac { hash, input } => {
            let tag = api::hmac(&config, hash.into(), &read(&input)?)
                .context("failed to compute HMAC")?;
            println!("{}", hex::encode(tag));
        }

        Commands::Persist {
            key,
            handle,
            keep_key_file,
        } => {
            let name = api::persist(&config, &key, handle, !keep_key_file)
                .with_context(|| format!("failed to persist key at {handle}"))?;
            println!("{handle} {name}");
        }

        Commands::Read { handle, expect } => {
            let public = api::read_persisted(&config, handle, expect.as_deref())
                .with_context(|| format!("failed to read {handle}"))?;
            print!("{}", public.to_pem()?);
        }

        Commands::Unpersist { handle } => {
            api::unpersist(&config, handle).with_context(|| format!("failed to evict {handle}"))?;
        }

        Commands::Info => {
            let (properties, persistent) = api::info(&config).context("failed to query module")?;
            println!("family: {}", properties.family);
            println!("manufacturer: {}", properties.manufacturer);
            println!("firmware: {}", properties.firmware_version);
            println!("transient slots: {}", properties.transient_slots);
            println!(
                "persistent slots: {}/{}",
                properties.persistent_loaded, properties.persistent_slots
            );
            for handle in persistent {
                println!("persistent: {handle}");
            }
        }

        Commands::Reset => {
            if api::reset_module(&config).context("failed to reset module")? {
                println!("module state discarded");
            }
        }
    }

    Ok(())
}
