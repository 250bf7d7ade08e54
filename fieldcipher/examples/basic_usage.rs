//! Basic usage example for `fieldcipher`.
//!
//! Run with `FIELDCIPHER_LOG=fieldcipher=trace` to see the lifecycle passes.

use fieldcipher::lifecycle::EntityListener;
use fieldcipher::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Encrypted)]
#[encrypted(table = "messages")]
struct Message {
    #[encrypted(blind_index(name = "insensitive", transformer = "case-insensitive"))]
    text: Option<String>,
    #[blind_index]
    text_blind_index_insensitive: Option<String>,
}

#[derive(Debug, Default, Encrypted)]
#[encrypted(table = "users")]
struct User {
    #[encrypted(
        blind_index(name = "last_four", transformer = "last-four-digits", bits = 32, fast),
        blind_index(name = "full", transformer = "digits-only")
    )]
    ssn: Option<String>,
    #[blind_index]
    ssn_blind_index_last_four: Option<String>,
    #[blind_index]
    ssn_blind_index_full: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_env("FIELDCIPHER_LOG")).init();

    println!("fieldcipher Basic Usage Example");
    println!("===============================\n");

    // A fixed key keeps the example reproducible; use a real key provider in production
    let provider = StaticKeyProvider::from_hex(
        "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
    )?;
    let engine = CipherEngine::new(provider).with_tenant("tenant_123");

    let interceptor = Interceptor::with_registry(engine, TransformerRegistry::with_builtins())
        .with_transformer("case-insensitive", Lowercase)?;
    interceptor.preload::<Message>()?;
    interceptor.preload::<User>()?;
    println!("✓ Interceptor ready, {} field(s) configured\n", interceptor.resolver().len());

    // Create: plaintext in, ciphertext and tokens out
    let mut message = Message { text: Some("This is a secret message.".into()), ..Message::default() };
    interceptor.on_before_create(&mut message)?;
    println!("Stored message:");
    println!("  text:        {}", message.text.as_deref().unwrap_or_default());
    println!("  insensitive: {}\n", message.text_blind_index_insensitive.as_deref().unwrap_or_default());

    // Query: compute the token for a differently cased search term
    let token =
        interceptor.blind_index::<Message>("text", "insensitive", "THIS IS A SECRET MESSAGE.")?;
    println!("Search token matches: {}", message.text_blind_index_insensitive.as_deref() == Some(token.as_str()));

    // Load: ciphertext back to plaintext
    interceptor.on_load(&mut message)?;
    println!("Loaded message: {:?}\n", message.text);

    let mut user = User { ssn: Some("123-45-6789".into()), ..User::default() };
    interceptor.on_before_create(&mut user)?;
    let by_last_four = interceptor.blind_index::<User>("ssn", "last_four", "6789")?;
    println!("User SSN tokens:");
    println!("  last_four: {}", user.ssn_blind_index_last_four.as_deref().unwrap_or_default());
    println!("  full:      {}", user.ssn_blind_index_full.as_deref().unwrap_or_default());
    println!(
        "  matches last-four search: {}",
        user.ssn_blind_index_last_four.as_deref() == Some(by_last_four.as_str())
    );

    Ok(())
}
