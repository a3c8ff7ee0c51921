use super::{Command, CommandError, CommandResult};
use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just};
use chumsky::{extra, text, Boxed, Parser};
use itertools::Itertools;

pub const STEP_COMMAND: &str = "step";
pub const STEP_COMMAND_SHORT: &str = "s";
pub const NEXT_COMMAND: &str = "next";
pub const NEXT_COMMAND_SHORT: &str = "n";
pub const RETURN_COMMAND: &str = "return";
pub const RETURN_COMMAND_SHORT: &str = "r";
pub const CONTINUE_COMMAND: &str = "continue";
pub const CONTINUE_COMMAND_SHORT: &str = "c";
pub const JUMP_COMMAND: &str = "jump";
pub const JUMP_COMMAND_SHORT: &str = "j";
pub const BREAK_COMMAND: &str = "break";
pub const BREAK_COMMAND_SHORT: &str = "b";
pub const TBREAK_COMMAND: &str = "tbreak";
pub const BREAK_CONDITION_KEY: &str = "if";
pub const CLEAR_COMMAND: &str = "clear";
pub const BREAKPOINTS_COMMAND: &str = "breakpoints";
pub const BREAKPOINTS_COMMAND_SHORT: &str = "bl";
pub const EVAL_COMMAND: &str = "eval";
pub const EVAL_COMMAND_SHORT: &str = "p";
pub const EXEC_COMMAND: &str = "exec";
pub const EXEC_COMMAND_SHORT: char = '!';
pub const WHERE_COMMAND: &str = "where";
pub const WHERE_COMMAND_SHORT: &str = "w";
pub const ENV_COMMAND: &str = "env";
pub const INTERRUPT_COMMAND: &str = "interrupt";
pub const INTERRUPT_COMMAND_SHORT: &str = "i";
pub const ATTACH_COMMAND: &str = "attach";
pub const DETACH_COMMAND: &str = "detach";
pub const STATE_COMMAND: &str = "state";
pub const QUIT_COMMAND: &str = "quit";
pub const QUIT_COMMAND_SHORT: &str = "q";
pub const HELP_COMMAND: &str = "help";
pub const HELP_COMMAND_SHORT: &str = "h";

type Err<'a> = extra::Err<Rich<'a, char>>;

/// A whole word, so `c` never matches the head of `clear`.
fn op<'a>(sym: &'static str) -> impl Parser<'a, &'a str, (), Err<'a>> + Clone {
    text::ident()
        .filter(move |word: &&str| *word == sym)
        .ignored()
        .padded()
}

fn op2<'a>(full: &'static str, short: &'static str) -> impl Parser<'a, &'a str, (), Err<'a>> + Clone {
    op(full).or(op(short))
}

pub fn line_number<'a>() -> impl Parser<'a, &'a str, u32, Err<'a>> + Clone {
    text::int(10)
        .try_map(|num: &str, span| num.parse::<u32>().map_err(|e| Rich::custom(span, e)))
        .padded()
        .labelled("line number")
}

/// `FILE:LINE`
pub fn place<'a>() -> impl Parser<'a, &'a str, (String, u32), Err<'a>> + Clone {
    any()
        .filter(|c: &char| *c != ':')
        .repeated()
        .at_least(1)
        .to_slice()
        .then_ignore(just(':'))
        .then(line_number())
        .map(|(file, line): (&str, u32)| (file.trim().to_string(), line))
        .padded()
        .labelled("FILE:LINE")
}

/// Everything up to the end of input, trimmed, at least one character.
pub fn rest<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    any()
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.trim().to_string())
}

fn command<'a, I>(ctx: &'static str, inner: I) -> Boxed<'a, 'a, &'a str, Command, Err<'a>>
where
    I: Parser<'a, &'a str, Command, Err<'a>> + 'a,
{
    inner.then_ignore(end()).labelled(ctx).boxed()
}

impl Command {
    /// Parse input string into command.
    pub fn parse(input: &str) -> CommandResult<Command> {
        if input.trim().is_empty() {
            return Err(CommandError::Empty);
        }
        Self::parser()
            .parse(input)
            .into_result()
            .map_err(|errors| CommandError::Parsing(errors.iter().join("; ")))
    }

    fn parser<'a>() -> impl Parser<'a, &'a str, Command, Err<'a>> {
        let step = op2(STEP_COMMAND, STEP_COMMAND_SHORT).to(Command::Step);
        let next = op2(NEXT_COMMAND, NEXT_COMMAND_SHORT).to(Command::Next);
        let r#return = op2(RETURN_COMMAND, RETURN_COMMAND_SHORT).to(Command::Return);

        let r#continue = op2(CONTINUE_COMMAND, CONTINUE_COMMAND_SHORT)
            .ignore_then(place().or_not())
            .map(Command::Continue);

        let jump = op2(JUMP_COMMAND, JUMP_COMMAND_SHORT)
            .ignore_then(line_number())
            .map(Command::Jump);

        let r#break = choice((
            op2(BREAK_COMMAND, BREAK_COMMAND_SHORT).to(false),
            op(TBREAK_COMMAND).to(true),
        ))
        .then(place())
        .then(op(BREAK_CONDITION_KEY).ignore_then(rest()).or_not())
        .map(|((temporary, (file, line)), condition)| Command::Break {
            file,
            line,
            temporary,
            condition,
        })
        .boxed();

        let clear = op(CLEAR_COMMAND)
            .ignore_then(choice((
                place().map(|(file, line)| Command::Clear {
                    file,
                    line: Some(line),
                }),
                rest().map(|file| Command::Clear { file, line: None }),
            )))
            .boxed();

        let breakpoints =
            op2(BREAKPOINTS_COMMAND, BREAKPOINTS_COMMAND_SHORT).to(Command::Breakpoints);

        let eval = op2(EVAL_COMMAND, EVAL_COMMAND_SHORT)
            .ignore_then(rest())
            .map(Command::Eval);

        let exec = op(EXEC_COMMAND)
            .or(just(EXEC_COMMAND_SHORT).padded().ignored())
            .ignore_then(rest())
            .map(Command::Exec);

        let r#where = op2(WHERE_COMMAND, WHERE_COMMAND_SHORT).to(Command::Where);
        let env = op(ENV_COMMAND).to(Command::Environment);
        let interrupt = op2(INTERRUPT_COMMAND, INTERRUPT_COMMAND_SHORT).to(Command::Interrupt);
        let attach = op(ATTACH_COMMAND).to(Command::Attach);
        let detach = op(DETACH_COMMAND).to(Command::Detach);
        let state = op(STATE_COMMAND).to(Command::State);
        let quit = op2(QUIT_COMMAND, QUIT_COMMAND_SHORT).to(Command::Quit);
        let help = op2(HELP_COMMAND, HELP_COMMAND_SHORT).to(Command::Help);

        choice((
            command(STEP_COMMAND, step),
            command(NEXT_COMMAND, next),
            command(RETURN_COMMAND, r#return),
            command(CONTINUE_COMMAND, r#continue),
            command(JUMP_COMMAND, jump),
            command(BREAK_COMMAND, r#break),
            command(CLEAR_COMMAND, clear),
            command(BREAKPOINTS_COMMAND, breakpoints),
            command(EVAL_COMMAND, eval),
            command(EXEC_COMMAND, exec),
            command(WHERE_COMMAND, r#where),
            command(ENV_COMMAND, env),
            command(INTERRUPT_COMMAND, interrupt),
            command(ATTACH_COMMAND, attach),
            command(DETACH_COMMAND, detach),
            command(STATE_COMMAND, state),
            command(QUIT_COMMAND, quit),
            command(HELP_COMMAND, help),
        ))
        .map_err(|e| {
            let span = e.span();
            if span.start == 0 && span.end == 0 {
                Rich::custom(*e.span(), "type help for list of commands")
            } else {
                e
            }
        })
    }
}

#[test]
fn test_place_parser() {
    struct TestCase {
        string: &'static str,
        result: Result<(&'static str, u32), ()>,
    }
    let cases = vec![
        TestCase {
            string: "/tmp/a.py:10",
            result: Ok(("/tmp/a.py", 10)),
        },
        TestCase {
            string: "  main.py : 7 ",
            result: Ok(("main.py", 7)),
        },
        TestCase {
            string: "main.py",
            result: Err(()),
        },
        TestCase {
            string: ":12",
            result: Err(()),
        },
        TestCase {
            string: "a.py:ten",
            result: Err(()),
        },
        TestCase {
            string: "a.py:99999999999",
            result: Err(()),
        },
    ];

    for tc in cases {
        let place = place().then_ignore(end()).parse(tc.string).into_result();
        assert_eq!(
            place.map_err(|_| ()),
            tc.result.map(|(file, line)| (file.to_string(), line)),
            "input: {}",
            tc.string
        );
    }
}

#[test]
fn test_parser() {
    struct TestCase {
        inputs: Vec<&'static str>,
        command_matcher: fn(result: Result<Command, CommandError>),
    }
    let cases = vec![
        TestCase {
            inputs: vec!["n", "next", "  next  "],
            command_matcher: |result| assert_eq!(result.unwrap(), Command::Next),
        },
        TestCase {
            inputs: vec!["s", "step"],
            command_matcher: |result| assert_eq!(result.unwrap(), Command::Step),
        },
        TestCase {
            inputs: vec!["c", "continue"],
            command_matcher: |result| assert_eq!(result.unwrap(), Command::Continue(None)),
        },
        TestCase {
            inputs: vec!["continue /tmp/a.py:12", "c  /tmp/a.py:12 "],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Continue(Some(("/tmp/a.py".to_string(), 12)))
                )
            },
        },
        TestCase {
            inputs: vec!["j 40", "jump  40"],
            command_matcher: |result| assert_eq!(result.unwrap(), Command::Jump(40)),
        },
        TestCase {
            inputs: vec!["b /tmp/a.py:10", "break /tmp/a.py:10"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Break {
                        file: "/tmp/a.py".to_string(),
                        line: 10,
                        temporary: false,
                        condition: None,
                    }
                )
            },
        },
        TestCase {
            inputs: vec!["tbreak a.py:7 if x > 1", " tbreak  a.py:7  if  x > 1 "],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Break {
                        file: "a.py".to_string(),
                        line: 7,
                        temporary: true,
                        condition: Some("x > 1".to_string()),
                    }
                )
            },
        },
        TestCase {
            inputs: vec!["clear /tmp/a.py:10"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Clear {
                        file: "/tmp/a.py".to_string(),
                        line: Some(10),
                    }
                )
            },
        },
        TestCase {
            inputs: vec!["clear /tmp/a.py"],
            command_matcher: |result| {
                assert_eq!(
                    result.unwrap(),
                    Command::Clear {
                        file: "/tmp/a.py".to_string(),
                        line: None,
                    }
                )
            },
        },
        TestCase {
            inputs: vec!["p len(items)", "eval   len(items) "],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Eval("len(items)".to_string()))
            },
        },
        TestCase {
            inputs: vec!["!x = 5", "exec x = 5", " ! x = 5"],
            command_matcher: |result| {
                assert_eq!(result.unwrap(), Command::Exec("x = 5".to_string()))
            },
        },
        TestCase {
            inputs: vec!["bl", "breakpoints"],
            command_matcher: |result| assert_eq!(result.unwrap(), Command::Breakpoints),
        },
        TestCase {
            inputs: vec!["env"],
            command_matcher: |result| assert_eq!(result.unwrap(), Command::Environment),
        },
        TestCase {
            inputs: vec!["h", "help"],
            command_matcher: |result| assert_eq!(result.unwrap(), Command::Help),
        },
        TestCase {
            inputs: vec!["", "   "],
            command_matcher: |result| assert_eq!(result, Err(CommandError::Empty)),
        },
        TestCase {
            inputs: vec![
                "fly",
                "jump",
                "j ten",
                "b a.py",
                "!",
                "p",
                "next now",
                "cont",
                "clear",
            ],
            command_matcher: |result| {
                assert!(matches!(result, Err(CommandError::Parsing(_))))
            },
        },
    ];

    for case in cases {
        for input in case.inputs {
            let result = Command::parse(input);
            (case.command_matcher)(result);
        }
    }
}
