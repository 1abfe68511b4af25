/// Device ids from `adb devices -l`: first column of every row, header and
/// blank rows dropped.
pub fn parse_device_ids(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .filter(|line| !line.to_lowercase().starts_with("list of devices"))
        .filter(|line| !line.starts_with("* daemon"))
        .filter_map(|line| line.split_whitespace().next())
        .map(|id| id.to_string())
        .collect()
}

/// Third-party packages from `pm list packages -3`.
pub fn parse_package_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("package:").trim().to_string())
        .filter(|package| !package.is_empty())
        .collect()
}

/// Activity components for `package` from `dumpsys package <package>`.
///
/// Mirrors `grep -A 1 'Activity'`: every line mentioning `Activity` plus the
/// line after it is considered; of those, lines naming the package yield the
/// token starting at the package name. Duplicates are collapsed, first
/// occurrence wins.
pub fn parse_activities(dumpsys: &str, package: &str) -> Vec<String> {
    if package.is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = dumpsys.lines().collect();
    let mut selected = vec![false; lines.len()];
    for (index, line) in lines.iter().enumerate() {
        if line.contains("Activity") {
            selected[index] = true;
            if let Some(next) = selected.get_mut(index + 1) {
                *next = true;
            }
        }
    }

    let mut activities: Vec<String> = Vec::new();
    for (line, _) in lines.iter().zip(selected).filter(|(_, keep)| *keep) {
        let Some(start) = line.find(package) else {
            continue;
        };
        let Some(token) = line[start..].split_whitespace().next() else {
            continue;
        };
        if !token.contains('/') {
            continue;
        }
        if !activities.iter().any(|existing| existing == token) {
            activities.push(token.to_string());
        }
    }
    activities
}

/// Device IP from `ip route`: the ninth field of the first row that has one
/// (the `src` address in `<net> dev <if> proto kernel scope link src <ip>`).
pub fn parse_ip_route(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(8))
        .map(|field| field.to_string())
        .next()
}
