//! `careon quote`: the CCTV quote wizard as a terminal chat.

use std::io::{self, BufRead, Write};

use careon_core::domain::cctv_quote::QuoteReceipt;
use careon_core::wizard::{
    CalculationScript, ChoiceOption, InputKind, QuoteSubmitter, StepPrompt, WizardEngine,
    WizardError, WizardState,
};
use chrono::Utc;
use thiserror::Error;

use crate::commands::{exit, load_config, runtime, CommandResult, LocalServices};
use crate::remote::HttpQuoteSubmitter;

/// How the calculating step is played back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pace {
    /// Timed messages, as a customer would see them.
    Scripted,
    Instant,
}

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("input closed before the quote was submitted")]
    InputClosed,
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Wizard(#[from] WizardError),
}

pub fn run(endpoint: Option<&str>, instant: bool) -> CommandResult {
    const COMMAND: &str = "quote";
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };
    let pace = if instant { Pace::Instant } else { Pace::Scripted };
    let mut engine = WizardEngine::new(config.quote.wizard_settings());

    let result = runtime.block_on(async {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout().lock();

        match endpoint {
            Some(endpoint) => {
                let submitter = HttpQuoteSubmitter::new(endpoint).map_err(|message| {
                    CommandResult::failure(COMMAND, "invalid_endpoint", message, exit::INPUT)
                })?;
                Ok::<_, CommandResult>(
                    drive(&mut engine, &submitter, &mut input, &mut output, pace).await,
                )
            }
            None => {
                let services = LocalServices::open(COMMAND, &config).await?;
                let outcome =
                    drive(&mut engine, services.intake.as_ref(), &mut input, &mut output, pace).await;
                services.close().await;
                Ok(outcome)
            }
        }
    });

    match result {
        Ok(Ok(receipt)) => CommandResult::success_with_data(
            COMMAND,
            format!("quote request {} submitted", receipt.id),
            serde_json::to_value(&receipt).ok(),
        ),
        Ok(Err(error)) => {
            let (error_class, exit_code) = match &error {
                DriveError::InputClosed => ("input_closed", exit::INPUT),
                DriveError::Io(_) => ("terminal_io", exit::INPUT),
                DriveError::Wizard(WizardError::Submission(_)) => ("submission", exit::REMOTE),
                DriveError::Wizard(_) => ("wizard", exit::INPUT),
            };
            CommandResult::failure(COMMAND, error_class, error.to_string(), exit_code)
        }
        Err(failure) => failure,
    }
}

/// Runs the wizard to submission, reading one answer per line.
///
/// Choices may be given by number (`2`) or by value (`house`); multi-choice
/// steps take several separated by commas or spaces. Rejected answers print
/// the wizard's message and ask again. A failed submission can be retried.
pub async fn drive<R, W>(
    engine: &mut WizardEngine,
    submitter: &dyn QuoteSubmitter,
    input: &mut R,
    output: &mut W,
    pace: Pace,
) -> Result<QuoteReceipt, DriveError>
where
    R: BufRead,
    W: Write,
{
    loop {
        match engine.state().clone() {
            WizardState::Asking(_) => {
                let prompt = engine.prompt().ok_or(WizardError::NotAwaitingAnswer)?;
                show_prompt(output, &prompt)?;
                let line = read_line(input)?;
                match answer(engine, &prompt, &line) {
                    Ok(echo) => writeln!(output, "> {echo}")?,
                    Err(error) => writeln!(output, "⚠️ {}", error.user_message())?,
                }
            }
            WizardState::Calculating => play_calculation(engine, output, pace).await?,
            WizardState::ReadyToSubmit => match engine.submit(submitter, Utc::now()).await {
                Ok(receipt) => {
                    writeln!(
                        output,
                        "✅ Thank you! Your request is in. We will be in touch shortly. (reference {})",
                        receipt.id
                    )?;
                    return Ok(receipt);
                }
                Err(error @ WizardError::Submission(_)) => {
                    writeln!(output, "⚠️ {}", error.user_message())?;
                    write!(output, "Try again? [y/N] ")?;
                    output.flush()?;
                    if !read_line(input)?.trim().eq_ignore_ascii_case("y") {
                        return Err(error.into());
                    }
                }
                Err(error) => return Err(error.into()),
            },
            WizardState::Submitted(receipt) => return Ok(receipt),
        }
    }
}

fn show_prompt<W: Write>(output: &mut W, prompt: &StepPrompt) -> io::Result<()> {
    writeln!(output)?;
    writeln!(output, "[{}%] {}", prompt.progress, prompt.question)?;
    for (index, option) in prompt.options.iter().enumerate() {
        writeln!(output, "  {}) {}", index + 1, option.label)?;
    }
    if prompt.input == InputKind::MultiChoice {
        writeln!(output, "  (several allowed, separated by commas)")?;
    }
    if let Some(placeholder) = prompt.placeholder {
        writeln!(output, "  ({placeholder})")?;
    }
    write!(output, "? ")?;
    output.flush()
}

fn read_line<R: BufRead>(input: &mut R) -> Result<String, DriveError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(DriveError::InputClosed);
    }
    Ok(line)
}

fn answer(engine: &mut WizardEngine, prompt: &StepPrompt, line: &str) -> Result<String, WizardError> {
    let line = line.trim();
    let outcome = match prompt.input {
        InputKind::SingleChoice | InputKind::Quantity => {
            engine.select(&resolve(&prompt.options, line))?
        }
        InputKind::MultiChoice => {
            // Start from a clean selection so a retried line is not toggled twice.
            for selected in &prompt.selected {
                engine.toggle(selected)?;
            }
            for value in selection(&prompt.options, line) {
                engine.toggle(&value)?;
            }
            engine.confirm_selection()?
        }
        InputKind::Text | InputKind::Tel => engine.enter_text(line)?,
        InputKind::Calculation => return Err(WizardError::NotAwaitingAnswer),
    };
    Ok(outcome.echo)
}

/// `"2"` picks the second option; anything else is taken as an option value.
fn resolve(options: &[ChoiceOption], token: &str) -> String {
    token
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| options.get(index))
        .map(|option| option.value.to_owned())
        .unwrap_or_else(|| token.to_owned())
}

/// Option values named on a multi-choice line, first mention wins.
fn selection(options: &[ChoiceOption], line: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for token in line.split([',', ' ']).filter(|token| !token.is_empty()) {
        let value = resolve(options, token);
        if !values.contains(&value) {
            values.push(value);
        }
    }
    values
}

async fn play_calculation<W: Write>(
    engine: &mut WizardEngine,
    output: &mut W,
    pace: Pace,
) -> Result<(), DriveError> {
    let script = match pace {
        Pace::Scripted => engine.calculation_script(&mut rand::thread_rng()),
        Pace::Instant => Some(CalculationScript::instant()),
    }
    .ok_or(WizardError::NotCalculating)?;

    writeln!(output)?;
    writeln!(output, "{}", script.intro)?;
    for message in &script.messages {
        tokio::time::sleep(message.delay).await;
        writeln!(output, "{}", message.text)?;
    }
    tokio::time::sleep(script.settle).await;

    let outcome = engine.finish_calculation()?;
    writeln!(output, "{}", outcome.echo)?;
    tokio::time::sleep(script.advance_after).await;
    Ok(())
}
