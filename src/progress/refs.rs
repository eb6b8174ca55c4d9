use git2::Oid;

/// Width the status token is padded to so reference names line up across
/// consecutive lines, matching porcelain fetch/push summaries.
const STATUS_WIDTH: usize = 25;
/// Abbreviation length for object ids in range markers.
const ABBREV_LEN: usize = 10;

/// Strip the remote-tracking prefix for display.
pub fn short_ref(name: &str) -> &str {
    name.strip_prefix("refs/remotes/").unwrap_or(name)
}

/// Classify an old/new object-id transition and render the fixed-width
/// status token: up to date, new, deleted, or an abbreviated range.
/// An absent or zero id stands for "no object".
pub fn update_description(old: Option<Oid>, new: Option<Oid>) -> String {
    let mut msg = String::new();
    if old == new {
        msg.push_str(" = [up to date]");
    } else if old.map_or(true, |o| o.is_zero()) {
        msg.push_str(" * [new branch]");
    } else if new.map_or(true, |n| n.is_zero()) {
        msg.push_str(" - [deleted]");
    } else if let (Some(old), Some(new)) = (old, new) {
        msg.push_str(&format!("   {}..{}", abbrev(&old), abbrev(&new)));
    }
    while msg.len() < STATUS_WIDTH {
        msg.push(' ');
    }
    msg
}

/// One full status line for a reference update.
pub fn update_line(name: &str, old: Option<Oid>, new: Option<Oid>) -> String {
    format!("{}  {}\n", update_description(old, new), short_ref(name))
}

fn abbrev(oid: &Oid) -> String {
    let full = oid.to_string();
    full[..ABBREV_LEN.min(full.len())].to_string()
}

/// Render one line per proposed push update and report whether any of them
/// actually changes its target. All-unchanged means there is nothing to
/// push and the negotiation should be rejected.
pub fn negotiate_updates(updates: &[git2::PushUpdate<'_>]) -> (Vec<String>, bool) {
    let mut lines = Vec::with_capacity(updates.len());
    let mut any_change = false;
    for update in updates {
        let name = update.dst_refname().unwrap_or("");
        let (src, dst) = (update.src(), update.dst());
        lines.push(update_line(name, Some(src), Some(dst)));
        any_change |= src != dst;
    }
    (lines, any_change)
}
