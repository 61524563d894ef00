use crate::core::types::{Message, Product, Role};
use crate::upload::Preview;
use colored::*;
use std::io::{self, Write};

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.len()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_warning(text: &str) {
    println!("{}", text.yellow());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

/// Prompts have no trailing newline, so stdout is flushed explicitly
pub fn print_prompt(text: &str) {
    let _ = write_prompt(&mut io::stdout().lock(), text);
}

fn write_prompt(out: &mut impl Write, text: &str) -> io::Result<()> {
    write!(out, "{}", text.yellow().bold())?;
    out.flush()
}

pub fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("{} {}", "You:".yellow().bold(), message.content),
        Role::Assistant => println!("{} {}", "Assistant:".bright_cyan().bold(), message.content),
    }

    if let Some(products) = &message.products {
        println!();
        for (i, product) in products.iter().enumerate() {
            print_product_card(i + 1, product);
        }
    }
    println!();
}

pub fn print_product_card(index: usize, product: &Product) {
    println!(
        "  {} {}  {}",
        format!("[{}]", index).bright_black(),
        product.name.bold(),
        product.price.green()
    );
    if let Some(line) = rating_line(product) {
        println!("      {}", line.yellow());
    }
    if let Some(url) = product.url.as_deref().filter(|u| !u.is_empty()) {
        println!("      {}", url.underline().bright_black());
    }
}

pub fn print_preview(preview: &Preview) {
    print_info(&format!(
        "Attached {} ({}x{}, {})",
        preview.name,
        preview.width,
        preview.height,
        human_bytes(preview.byte_len)
    ));
}

pub(crate) fn rating_line(product: &Product) -> Option<String> {
    let rating = product.rating?;
    Some(match product.review_count {
        Some(count) => format!("★ {:.1}/5 ({} reviews)", rating, count),
        None => format!("★ {:.1}/5", rating),
    })
}

pub(crate) fn human_bytes(len: usize) -> String {
    if len >= 1024 * 1024 {
        format!("{:.1} MB", len as f64 / (1024.0 * 1024.0))
    } else if len >= 1024 {
        format!("{:.0} KB", len as f64 / 1024.0)
    } else {
        format!("{} B", len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::sample_product;

    /// Only counts bytes as visible once they are flushed
    #[derive(Default)]
    struct Terminal {
        buffered: Vec<u8>,
        shown: Vec<u8>,
    }

    impl Write for Terminal {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffered.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.shown.append(&mut self.buffered);
            Ok(())
        }
    }

    #[test]
    fn test_prompt_is_visible_without_newline() {
        let mut terminal = Terminal::default();

        write_prompt(&mut terminal, "You: ").unwrap();

        assert!(String::from_utf8_lossy(&terminal.shown).contains("You: "));
        assert!(terminal.buffered.is_empty());
    }

    #[test]
    fn test_rating_line() {
        let mut product = sample_product("a");
        assert_eq!(rating_line(&product), None);

        product.rating = Some(4.3);
        assert_eq!(rating_line(&product).unwrap(), "★ 4.3/5");

        product.review_count = Some(14356);
        assert_eq!(rating_line(&product).unwrap(), "★ 4.3/5 (14356 reviews)");
    }

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(400 * 1024), "400 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
    }
}
