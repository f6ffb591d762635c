//! Page-at-a-time browsing with `n`/`p`/`q` and numeric selection.

use crate::console::{parse_choice, Console};
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct PageSpec {
    /// Plural noun used in "no ... found" messages.
    pub items: &'static str,
    pub page_size: usize,
    /// Browse-only listings reject numeric input.
    pub selectable: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Browse<T> {
    Selected(T),
    /// Operator typed `q`.
    Quit,
    /// The first page was empty.
    Empty,
}

/// Show page after page until the operator selects an entry or quits.
///
/// `fetch(page_size, page_number)` is called only when the page to show
/// actually changes; boundary no-ops and bad input redisplay the last page.
pub fn browse<T, C, F, R>(
    console: &mut C,
    spec: PageSpec,
    mut fetch: F,
    render: R,
) -> Result<Browse<T>>
where
    C: Console,
    F: FnMut(usize, usize) -> Result<Vec<T>>,
    R: Fn(&T) -> String,
{
    let mut page_number = 1;
    let mut page: Vec<T> = Vec::new();
    let mut refetch = true;
    // whether the most recent fetch filled a page; an empty fetch clears it
    let mut last_full = false;

    loop {
        if refetch {
            let fetched = fetch(spec.page_size, page_number)?;
            last_full = fetched.len() == spec.page_size;
            if !fetched.is_empty() {
                page = fetched;
            } else if page_number == 1 {
                console.println(&format!("no {} found", spec.items))?;
                return Ok(Browse::Empty);
            } else {
                // stay on the page already shown
                console.println(&format!("no more {} found", spec.items))?;
                page_number -= 1;
            }
        }
        for (i, item) in page.iter().enumerate() {
            console.println(&format!("{}. {}", i + 1, render(item)))?;
        }

        let label = if spec.selectable {
            "\nSelect by number or scroll with n(ext)/p(revious)/q(uit): "
        } else {
            "\nScroll with n(ext)/p(revious)/q(uit): "
        };
        let choice = console.prompt(label)?;

        refetch = false;
        match choice.as_str() {
            "n" => {
                if last_full {
                    page_number += 1;
                    refetch = true;
                }
            }
            "p" => {
                if page_number > 1 {
                    page_number -= 1;
                    refetch = true;
                }
            }
            "q" => return Ok(Browse::Quit),
            other if spec.selectable => match parse_choice(other, page.len()) {
                Ok(i) => return Ok(Browse::Selected(page.swap_remove(i))),
                Err(e) => console.println(&format!("{e}, try again"))?,
            },
            _ => console.println("invalid input, try again")?,
        }
    }
}
