use cardaction_core::ReaderRoster;
use cardaction_pcsc::PcscDeviceManager;

/// Print the available readers and whether each holds a card
pub(crate) fn list_readers(manager: &PcscDeviceManager) -> eyre::Result<()> {
    let roster = manager.list_readers()?;
    print!("{}", format_roster(&roster));
    Ok(())
}

fn format_roster(roster: &ReaderRoster) -> String {
    if roster.is_empty() {
        return "No readers found!\n".to_string();
    }

    let mut out = String::from("Available readers:\n");
    for (i, reader) in roster.readers().iter().enumerate() {
        let status = if reader.has_card {
            "card present"
        } else {
            "no card"
        };
        out.push_str(&format!("{}. {} ({})\n", i, reader.name, status));
    }
    out
}
