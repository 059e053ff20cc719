//! Key binding configuration for sift.
//!
//! Each `[[bindings]]` table in sift.toml binds one or more key names to a script. The
//! built-in table below is applied first; user bindings go on top of it in file order.
//!
//! A script whose first line starts with `#` uses that line as its help description. A body
//! of the form `+command` runs the command directly; anything else runs in the shell with the
//! selection as `"$@"`, the cursor entry in `$SIFT_CURSOR`, and `sift_cmd` available to queue
//! commands back to the browser.

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub(crate) struct BindingConfig {
    keys: Vec<String>,
    script: String,
}

impl BindingConfig {
    #[inline]
    pub(crate) fn keys(&self) -> &[String] {
        &self.keys
    }

    #[inline]
    pub(crate) fn script(&self) -> &str {
        &self.script
    }
}

/// The built-in binding table, in help order.
#[rustfmt::skip]
pub(crate) const DEFAULT_BINDINGS: &[(&[&str], &str)] = &[
    (&["?", "F1"],                      "#Help\n+help"),
    (&["q"],                            "#Quit\n+quit"),
    (&["j", "Down"],                    "#Move down\n+move:+1"),
    (&["k", "Up"],                      "#Move up\n+move:-1"),
    (&["g", "Home"],                    "#Go to top\n+move:0"),
    (&["G", "End"],                     "#Go to bottom\n+move:100%n"),
    (&["Ctrl-d"],                       "#Half page down\n+move:+50%"),
    (&["Ctrl-u"],                       "#Half page up\n+move:-50%"),
    (&["PgDn", "Ctrl-f"],               "#Page down\n+move:+100%"),
    (&["PgUp", "Ctrl-b"],               "#Page up\n+move:-100%"),
    (&["h", "Left", "Backspace"],       "#Parent directory\n+cd:.."),
    (&["l", "Right", "Enter"],
        "#Open\nif [ -d \"$SIFT_CURSOR\" ]; then sift_cmd \"cd:$SIFT_CURSOR\"; \
         else ${PAGER:-less} \"$SIFT_CURSOR\"; fi"),
    (&["Space"],                        "#Toggle selection\n+toggle:"),
    (&["a"],                            "#Toggle all\n+toggle"),
    (&["Esc"],                          "#Clear selection\n+deselect"),
    (&["J"],                            "#Spread selection down\n+spread:+1"),
    (&["K"],                            "#Spread selection up\n+spread:-1"),
    (&["[", "Alt-Left"],                "#Back\n+cd:<"),
    (&["]", "Alt-Right"],               "#Forward\n+cd:>"),
    (&["~"],                            "#Home directory\n+cd:"),
    (&["-"],                            "#Previous directory\n+cd:-"),
    (&["r", "Ctrl-l"],                  "#Refresh\n+refresh"),
    (&["."],
        "#Toggle dotfiles\ncase $SIFT_GLOB in \
         '*') sift_cmd 'glob:.[!.]* ..?* *' ;; *) sift_cmd 'glob:*' ;; esac"),
    (&["s"],                            "#Sort\nprintf 'sort [%s]: ' \"$SIFT_SORT\"; read -r s && sift_cmd \"sort:$s\""),
    (&["/"],                            "#Glob\nprintf 'glob [%s]: ' \"$SIFT_GLOB\"; read -r g && sift_cmd \"glob:$g\""),
    (&["c"],                            "#Columns\nprintf 'columns [%s]: ' \"$SIFT_COLUMNS\"; read -r c && sift_cmd \"columns:$c\""),
    (&["i"],                            "#Interleave directories\n+interleave"),
    (&["z"],                            "#Resume job\n+fg"),
    (&["Ctrl-z"],                       "#Suspend\n+suspend"),
    (&["e"],
        "#Edit\nif [ $# -gt 0 ]; then ${EDITOR:-vi} \"$@\"; \
         else ${EDITOR:-vi} \"$SIFT_CURSOR\"; fi"),
    (&["D"],
        "#Delete\n[ $# -eq 0 ] && set -- \"$SIFT_CURSOR\"; printf '%s\\n' \"$@\"; \
         printf 'Delete? [y/N] '; read -r a; [ \"$a\" = y ] && rm -rf -- \"$@\" && sift_cmd deselect"),
    (&["!"],                            "#Shell\n${SHELL:-sh}"),
    (&["Colon"],                        "#Run command\nprintf ': '; read -r c && sift_cmd \"$c\""),
    (&["MouseLeft"],
        "#Click to move or sort\ncase $SIFT_CLICKED in \
         '<column label>') sift_cmd \"sort:~$SIFT_MOUSECOL\" ;; '') ;; \
         *) sift_cmd \"goto:$SIFT_CLICKED\" ;; esac"),
    (&["MouseLeftDouble"],
        "#Double-click to open\nif [ -d \"$SIFT_CLICKED\" ]; then sift_cmd \"cd:$SIFT_CLICKED\"; \
         elif [ -f \"$SIFT_CLICKED\" ]; then ${PAGER:-less} \"$SIFT_CLICKED\"; fi"),
    (&["MouseRight"],
        "#Right-click to toggle selection\ncase $SIFT_CLICKED in \
         '<column label>'|'') ;; *) sift_cmd \"toggle:$SIFT_CLICKED\" ;; esac"),
    (&["ScrollUp"],                     "#Scroll up\n+scroll:-3"),
    (&["ScrollDown"],                   "#Scroll down\n+scroll:+3"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_default_has_a_description() {
        for (keys, script) in DEFAULT_BINDINGS {
            assert!(!keys.is_empty());
            assert!(script.starts_with('#'), "{keys:?} lacks a description");
            assert!(script.contains('\n'));
        }
    }
}
