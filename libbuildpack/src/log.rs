//! User facing build output.
//!
//! Output errors are ignored: a build must not fail because its log could not be written.

use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

pub fn log_error(header: impl AsRef<str>, body: impl AsRef<str>) {
    let mut stream = StandardStream::stderr(ColorChoice::Auto);
    let _ = write_styled_message(
        &mut stream,
        format!("\n[Error: {}]", header.as_ref()),
        ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true),
    )
    .and_then(|()| {
        write_styled_message(&mut stream, body, ColorSpec::new().set_fg(Some(Color::Red)))
    })
    .and_then(|()| stream.flush());
}

pub fn log_warning(header: impl AsRef<str>, body: impl AsRef<str>) {
    let mut stream = StandardStream::stderr(ColorChoice::Auto);
    let _ = write_styled_message(
        &mut stream,
        format!("\n[Warning: {}]", header.as_ref()),
        ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true),
    )
    .and_then(|()| {
        write_styled_message(
            &mut stream,
            body,
            ColorSpec::new().set_fg(Some(Color::Yellow)),
        )
    })
    .and_then(|()| stream.flush());
}

pub fn log_header(title: impl AsRef<str>) {
    let mut stream = StandardStream::stdout(ColorChoice::Auto);
    let _ = write_styled_message(
        &mut stream,
        format!("\n[{}]", title.as_ref()),
        ColorSpec::new().set_fg(Some(Color::Magenta)).set_bold(true),
    )
    .and_then(|()| stream.flush());
}

pub fn log_info(message: impl AsRef<str>) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", message.as_ref()).and_then(|()| stdout.flush());
}

// Styles each line of text separately, so that when buildpack output is streamed to the
// user (and prefixes like `remote:` added) the line colour doesn't leak into the prefixes.
pub(crate) fn write_styled_message(
    stream: &mut impl WriteColor,
    message: impl AsRef<str>,
    spec: &ColorSpec,
) -> io::Result<()> {
    // `split('\n')` keeps trailing empty lines, unlike `lines()`.
    for line in message.as_ref().split('\n') {
        stream.set_color(spec)?;
        write!(stream, "{line}")?;
        stream.reset()?;
        writeln!(stream)?;
    }
    Ok(())
}
