//! `multichat login|register|logout` against the account backend.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::cli::AppContext;
use crate::core::auth::Identity;

pub async fn run_login(context: &AppContext, email: &str) -> Result<(), Box<dyn Error>> {
    let password = prompt_password("Password: ")?;
    let identity = context.auth_client.login(email, &password).await?;
    print_signed_in(&identity, context);
    Ok(())
}

pub async fn run_register(context: &AppContext, email: &str) -> Result<(), Box<dyn Error>> {
    let password = prompt_password("Choose a password: ")?;
    let confirm = prompt_password("Repeat password: ")?;
    if password != confirm {
        return Err("Passwords do not match".into());
    }
    let identity = context.auth_client.register(email, &password).await?;
    print_signed_in(&identity, context);
    Ok(())
}

pub fn run_logout(context: &AppContext) {
    if !context.auth.is_signed_in() {
        println!("Not signed in.");
        return;
    }
    context.auth_client.logout();
    println!("✓ Signed out. Conversations are now kept on this device only.");
}

fn print_signed_in(identity: &Identity, context: &AppContext) {
    println!("✓ Signed in as {}", identity.user.email);
    if let Some(remote) = &context.config.remote {
        println!("  Conversations sync with {}", remote.base_url);
    }
}

fn prompt_password(prompt: &str) -> Result<String, Box<dyn Error>> {
    print!("{prompt}");
    io::stdout().flush()?;
    read_password(io::stdin().lock())
}

pub(crate) fn read_password(mut reader: impl BufRead) -> Result<String, Box<dyn Error>> {
    let mut input = String::new();
    reader.read_line(&mut input)?;
    let password = input.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err("Password cannot be empty".into());
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn passwords_keep_inner_whitespace() {
        let password = read_password(Cursor::new(" hunter 2 \r\n")).unwrap();
        assert_eq!(password, " hunter 2 ");
    }

    #[test]
    fn empty_password_is_rejected() {
        let err = read_password(Cursor::new("\n")).unwrap_err();
        assert_eq!(err.to_string(), "Password cannot be empty");
    }
}
