//! Offline key and token helpers

use clap::Args;

use crate::infrastructure::crypto::{KeyCodec, DEFAULT_PREFIX};

#[derive(Args, Debug)]
pub struct GenerateKeyArgs {
    /// Secret prefix, normalized to end with a single '-'
    #[arg(long, default_value = DEFAULT_PREFIX)]
    pub prefix: String,
}

#[derive(Args, Debug)]
pub struct IssueTokenArgs {
    /// Subject and user id claim of the token
    #[arg(long)]
    pub user_id: String,
}

/// Print a new secret, its display prefix and storage hash.
///
/// Needs no configuration: hashing is unpeppered.
pub fn generate(args: GenerateKeyArgs) -> anyhow::Result<()> {
    let codec = KeyCodec::new(Vec::<u8>::new());
    let key = codec.generate(&args.prefix);

    println!("secret:  {}", key.secret);
    println!("prefix:  {}", key.display_prefix);
    println!("sha256:  {}", key.hash);

    Ok(())
}

pub fn issue_token(args: IssueTokenArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let verifier = crate::create_jwt_verifier(&config)?;

    let token = verifier.issue(&args.user_id)?;
    println!("{}", token);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_without_config() {
        let args = GenerateKeyArgs {
            prefix: "acme".to_string(),
        };
        assert!(generate(args).is_ok());
    }
}
