use std::io::{self, BufRead, Write};

/// Character I/O for the console traps.
pub trait Console {
    /// Next input character, `0xFFFF` once input is exhausted.
    fn get_char(&mut self) -> io::Result<u16>;

    /// Next unsigned decimal word, skipping leading whitespace. `None` when
    /// no digits follow.
    fn get_u16(&mut self) -> io::Result<Option<u16>>;

    fn put_char(&mut self, c: u8) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    fn put_str(&mut self, s: &str) -> io::Result<()> {
        s.bytes().try_for_each(|c| self.put_char(c))
    }
}

/// A [`Console`] over any buffered reader and writer.
pub struct IoConsole<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> IoConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        IoConsole { input, output }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.input.fill_buf()?.first().copied())
    }
}

impl IoConsole<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        IoConsole::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console for IoConsole<R, W> {
    fn get_char(&mut self) -> io::Result<u16> {
        self.output.flush()?;

        match self.peek()? {
            Some(c) => {
                self.input.consume(1);
                Ok(c as u16)
            }
            None => Ok(0xFFFF),
        }
    }

    fn get_u16(&mut self) -> io::Result<Option<u16>> {
        self.output.flush()?;

        while let Some(c) = self.peek()? {
            if !c.is_ascii_whitespace() {
                break;
            }
            self.input.consume(1);
        }

        let mut value: Option<u16> = None;

        while let Some(c) = self.peek()? {
            if !c.is_ascii_digit() {
                break;
            }
            self.input.consume(1);

            let digit = (c - b'0') as u16;
            value = Some(value.unwrap_or(0).wrapping_mul(10).wrapping_add(digit));
        }

        Ok(value)
    }

    fn put_char(&mut self, c: u8) -> io::Result<()> {
        self.output.write_all(&[c])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
