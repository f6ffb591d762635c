//! The recursive menu driver.
//!
//! Each call handles one level of the tree. The set of entries offered at a
//! level depends on what the actions above it stored in the [`Context`], so
//! the driver recurses into `valid_children` after every action instead of
//! walking a fixed list.

use std::fmt::Write as _;

use tracing::{debug, warn};

use crate::console::{Console, MenuChoice};
use crate::context::Context;
use crate::error::{ActionError, Result};
use crate::menu::{ActionNode, Executor, Navigation};

fn render_options<A>(actions: &[&ActionNode<A>]) -> String {
    let mut options = String::new();
    let mut contains_quit = false;
    for (i, action) in actions.iter().enumerate() {
        if action.is_quit() {
            contains_quit = true;
            let _ = writeln!(options, "Q: {}", action.name);
        } else {
            let _ = writeln!(options, "{}: {}", i + 1, action.name);
        }
    }
    if !contains_quit {
        options.push_str("B: Back\nQ: Quit\n");
    }
    options
}

/// Drive one menu level and everything chosen beneath it.
///
/// Returns `Back` when unwinding because the session is quitting and
/// `Advance` when the operator left the level normally. Fatal action errors
/// and console failures propagate.
pub fn run_menu<A, C, E>(
    console: &mut C,
    executor: &mut E,
    ctx: &mut Context,
    actions: &[&ActionNode<A>],
) -> Result<Navigation>
where
    C: Console,
    E: Executor<A>,
{
    if ctx.should_quit() {
        return Ok(Navigation::Back);
    }
    if actions.is_empty() {
        return Ok(Navigation::Advance);
    }

    let options = render_options(actions);

    loop {
        console.write_str(&format!("\nChoose an action: \n{options}\nChoice: "))?;
        let choice = match console.read_menu_choice(actions.len()) {
            Ok(choice) => choice,
            Err(e) if e.is_input() => {
                console.println(&format!("{e}, try again"))?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let node = match choice {
            MenuChoice::Back => break,
            MenuChoice::Quit => {
                ctx.request_quit();
                break;
            }
            MenuChoice::Index(i) => actions[i],
        };
        if node.is_quit() {
            ctx.request_quit();
            break;
        }

        if let Some(action) = &node.action {
            debug!(action = node.name, "running action");
            match executor.execute(action, console, ctx) {
                Ok(Navigation::Advance) => {}
                Ok(Navigation::Back) => break,
                Ok(Navigation::Repeat) => continue,
                Err(ActionError::Recoverable(message)) => {
                    warn!(action = node.name, %message, "action rejected");
                    console.println(&message)?;
                    continue;
                }
                Err(ActionError::Fatal(e)) => return Err(e),
            }
            if ctx.should_quit() {
                break;
            }
        }

        let children = node.valid_children(ctx);
        if !children.is_empty() {
            let result = run_menu(console, executor, ctx, &children);
            if ctx.should_quit() {
                break;
            }
            if result? == Navigation::Back {
                break;
            }
        }
    }

    Ok(if ctx.should_quit() {
        Navigation::Back
    } else {
        Navigation::Advance
    })
}
