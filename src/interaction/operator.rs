//! Operator input and output.
//!
//! Everything that talks to the person running the tool goes through
//! [`GenericOperator`], so setup and login flows can be driven by a script in tests.

use std::{io::Write, ops::Deref, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin},
    sync::Mutex,
};

use crate::base::types::{Res, Void};

// Traits.

/// Generic operator trait that front ends must implement.
#[async_trait]
pub trait GenericOperator: Send + Sync + 'static {
    /// Show `question` and wait for one line of input, without its line ending.
    ///
    /// Fails once input is exhausted.
    async fn prompt(&self, question: &str) -> Res<String>;

    /// Like [`GenericOperator::prompt`], but the answer is not echoed.
    async fn prompt_secret(&self, question: &str) -> Res<String>;

    /// Show an informational line.
    fn say(&self, text: &str);
}

// Structs.

/// Operator handle for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Operator {
    inner: Arc<dyn GenericOperator>,
}

impl Deref for Operator {
    type Target = dyn GenericOperator;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl Operator {
    pub fn new(inner: Arc<dyn GenericOperator>) -> Self {
        Self { inner }
    }

    /// Creates an operator bound to the process's stdin and stdout.
    pub fn console() -> Self {
        Self::new(Arc::new(ConsoleOperator::new()))
    }
}

/// Operator on the terminal.
///
/// Ctrl+C while waiting for an answer fails the prompt with `Interrupted.`, which
/// ends the menu.
pub struct ConsoleOperator {
    stdin: Mutex<BufReader<Stdin>>,
}

impl ConsoleOperator {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenericOperator for ConsoleOperator {
    async fn prompt(&self, question: &str) -> Res<String> {
        print_inline(question)?;

        let mut stdin = self.stdin.lock().await;

        read_answer(&mut *stdin, async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    async fn prompt_secret(&self, question: &str) -> Res<String> {
        print_inline(question)?;

        let _stdin = self.stdin.lock().await;
        let secret = tokio::task::spawn_blocking(read_hidden_line).await??;

        println!();

        Ok(secret)
    }

    fn say(&self, text: &str) {
        println!("{text}");
    }
}

// Helpers.

fn print_inline(text: &str) -> Void {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;

    Ok(())
}

/// Read one line from `reader`, giving up when `interrupt` resolves first.
async fn read_answer<R, F>(reader: &mut R, interrupt: F) -> Res<String>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut line = String::new();

    let read = tokio::select! {
        biased;
        _ = interrupt => return Err(anyhow!("Interrupted.")),
        read = reader.read_line(&mut line) => read?,
    };

    if read == 0 {
        return Err(anyhow!("Input closed."));
    }

    Ok(strip_line_ending(&line).to_string())
}

/// Read a line from the terminal in raw mode, so nothing is echoed.
fn read_hidden_line() -> Res<String> {
    terminal::enable_raw_mode()?;
    let result = read_hidden_keys();
    terminal::disable_raw_mode()?;

    result
}

fn read_hidden_keys() -> Res<String> {
    let mut input = String::new();

    loop {
        if let Event::Key(KeyEvent { code, modifiers, kind, .. }) = event::read()? {
            if kind == KeyEventKind::Release {
                continue;
            }

            match code {
                KeyCode::Enter => return Ok(input),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Err(anyhow!("Interrupted.")),
                KeyCode::Char(c) => input.push(c),
                _ => {}
            }
        }
    }
}

/// Drop a trailing `\n` or `\r\n`; inner and leading whitespace is kept.
pub fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).unwrap_or(line)
}

// Tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::VecDeque, sync::Mutex as StdMutex};

    use super::*;

    /// Answers prompts from a fixed script and records everything shown.
    #[derive(Default)]
    pub(crate) struct ScriptedOperator {
        pub answers: StdMutex<VecDeque<String>>,
        pub transcript: StdMutex<Vec<String>>,
        pub secrets_asked: StdMutex<usize>,
    }

    impl ScriptedOperator {
        pub fn new<I, S>(answers: I) -> Arc<Self>
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Arc::new(Self {
                answers: StdMutex::new(answers.into_iter().map(Into::into).collect()),
                transcript: StdMutex::default(),
                secrets_asked: StdMutex::default(),
            })
        }

        pub fn saw(&self, text: &str) -> bool {
            self.transcript.lock().unwrap().iter().any(|line| line.contains(text))
        }
    }

    #[async_trait]
    impl GenericOperator for ScriptedOperator {
        async fn prompt(&self, question: &str) -> Res<String> {
            self.transcript.lock().unwrap().push(question.to_string());
            self.answers.lock().unwrap().pop_front().ok_or_else(|| anyhow!("Input closed."))
        }

        async fn prompt_secret(&self, question: &str) -> Res<String> {
            *self.secrets_asked.lock().unwrap() += 1;
            self.prompt(question).await
        }

        fn say(&self, text: &str) {
            self.transcript.lock().unwrap().push(text.to_string());
        }
    }

    #[test]
    fn strip_line_ending_keeps_content() {
        assert_eq!(strip_line_ending("first!\n"), "first!");
        assert_eq!(strip_line_ending("first!\r\n"), "first!");
        assert_eq!(strip_line_ending("  spaced out  \n"), "  spaced out  ");
        assert_eq!(strip_line_ending("no newline"), "no newline");
    }

    #[tokio::test]
    async fn scripted_operator_fails_when_exhausted() {
        let scripted = ScriptedOperator::new(["1"]);
        let operator = Operator::new(scripted.clone());

        assert_eq!(operator.prompt("Enter your choice: ").await.unwrap(), "1");
        assert!(operator.prompt("Enter your choice: ").await.is_err());
        assert!(scripted.saw("Enter your choice"));
    }

    #[tokio::test]
    async fn read_answer_strips_the_line_ending() {
        let mut input: &[u8] = b"12345\r\nleftover\n";

        let answer = read_answer(&mut input, std::future::pending::<()>()).await.unwrap();

        assert_eq!(answer, "12345");
    }

    #[tokio::test]
    async fn read_answer_fails_on_closed_input() {
        let mut input: &[u8] = b"";

        let err = read_answer(&mut input, std::future::pending::<()>()).await.unwrap_err();

        assert_eq!(err.to_string(), "Input closed.");
    }

    #[tokio::test]
    async fn read_answer_gives_up_when_interrupted() {
        let mut input: &[u8] = b"4\n";

        let err = read_answer(&mut input, async {}).await.unwrap_err();

        assert_eq!(err.to_string(), "Interrupted.");
    }
}
