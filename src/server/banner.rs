use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::error::ApiResult;

const LOGO: &[&str] = &[
    r" _____          _     _                         _ ",
    r"|__  /__ _ ___ | |__ | |__   ___   __ _ _ __ __| |",
    r"  / // _` / __|| '_ \| '_ \ / _ \ / _` | '__/ _` |",
    r" / /| (_| \__ \| | | | |_) | (_) | (_| | | | (_| |",
    r"/____\__,_|___/|_| |_|_.__/ \___/ \__,_|_|  \__,_|",
];

pub fn print() -> ApiResult<()> {
    let mut out = StandardStream::stdout(ColorChoice::Auto);

    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    for line in LOGO {
        writeln!(out, "{line}")?;
    }

    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    writeln!(
        out,
        "  {} v{}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION")
    )?;
    out.reset()?;
    writeln!(out)?;

    Ok(())
}
