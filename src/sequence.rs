//! Phase sequencer
//!
//! Reads the accumulated aggregator state and produces the raw, unformatted
//! line sequence for the RUN block. Package-manager bootstrap phases are
//! emitted only when the relevant sets are non-empty; user-supplied phase
//! buffers are interleaved in a fixed order; build-only dependencies are
//! purged after the run phase so the final image stays minimal.

use std::collections::BTreeSet;

use crate::dockerfile::Dockerfile;
use crate::line::Line;

const APT: &str = "DEBIAN_FRONTEND=noninteractive apt-get";
const INSTALL: &str =
    "DEBIAN_FRONTEND=noninteractive apt-get install -y --no-install-recommends ";

/// Produce the ordered raw line sequence from aggregator state
///
/// Pure read: the same state always yields the same sequence.
pub fn sequence(dockerfile: &Dockerfile) -> Vec<Line> {
    let mut lines = Vec::new();

    lines.extend_from_slice(&dockerfile.begin);

    // Requirements are transitive needs of pre-install steps (key import
    // tools and the like); they must be present before those steps run.
    if !dockerfile.requirements.is_empty() {
        lines.extend(update_package_list());
        lines.extend(install_block(&dockerfile.requirements));
    }

    lines.extend_from_slice(&dockerfile.pre_install);

    // The requirements set is promoted out of the user-requested packages
    // before emission; a package never appears in both install blocks.
    let packages: BTreeSet<String> = dockerfile
        .packages
        .difference(&dockerfile.requirements)
        .cloned()
        .collect();

    if dockerfile.deb_flag || !packages.is_empty() || !dockerfile.depends.is_empty() {
        lines.extend(update_package_list());

        let install: BTreeSet<String> = packages.union(&dockerfile.depends).cloned().collect();
        if !install.is_empty() {
            lines.extend(install_block(&install));
        }

        lines.extend_from_slice(&dockerfile.install);

        if dockerfile.deb_flag {
            lines.push(Line::comment("Installing deb package dependencies"));
            lines.push(Line::command(format!(
                "{} -y -f install --no-install-recommends",
                APT
            )));
            lines.push(Line::Break);
        }

        if !dockerfile.post_install.is_empty() {
            lines.push(Line::comment("Removing temporary files"));
            lines.extend_from_slice(&dockerfile.post_install);
            lines.push(Line::Break);
        }

        lines.push(Line::comment("Cleaning up after installation"));
        lines.push(Line::command(format!("{} clean", APT)));
        lines.push(Line::command("rm -rf /var/lib/apt/lists/* /tmp/* /var/tmp/*"));
        lines.push(Line::Break);
    }

    lines.extend_from_slice(&dockerfile.run);

    // Build-only dependencies may be used by any run command; purge them
    // only once the run phase is complete.
    if !dockerfile.depends.is_empty() {
        let listed: Vec<&str> = dockerfile.depends.iter().map(String::as_str).collect();
        lines.push(Line::comment("Removing build dependencies"));
        lines.push(Line::command(format!(
            "{} purge -y --auto-remove {}",
            APT,
            listed.join(" ")
        )));
        lines.push(Line::Break);
    }

    lines.extend_from_slice(&dockerfile.end);

    lines
}

fn update_package_list() -> Vec<Line> {
    vec![
        Line::comment("Updating Package List"),
        Line::command(format!("{} update", APT)),
        Line::Break,
    ]
}

/// Build the one-package-per-line install block
///
/// The first line carries the install command, continuation lines are padded
/// to its width, every line carries an explicit `\`, and the last package
/// line closes the statement with `&& \`.
fn install_block(packages: &BTreeSet<String>) -> Vec<Line> {
    let mut lines = vec![Line::comment("Installing packages")];
    let pad = " ".repeat(INSTALL.len());
    let last = packages.len().saturating_sub(1);

    for (index, package) in packages.iter().enumerate() {
        let prefix = if index == 0 { INSTALL } else { pad.as_str() };
        let tail = if index == last { "&& \\" } else { "\\" };
        lines.push(Line::command(format!("{}{} {}", prefix, package, tail)));
    }

    lines.push(Line::Break);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::Dockerfile;

    fn commands(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .filter_map(|l| match l {
                Line::Command(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn comments(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .filter_map(|l| match l {
                Line::Comment(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    // === Conditional Emission Tests ===

    #[test]
    fn test_no_packages_no_bootstrap_phases() {
        let mut dockerfile = Dockerfile::new();
        dockerfile.run("echo hi");

        let lines = sequence(&dockerfile);
        assert!(comments(&lines).is_empty());
        assert_eq!(commands(&lines), vec!["echo hi".to_string()]);
    }

    #[test]
    fn test_packages_trigger_update_and_cleanup() {
        let mut dockerfile = Dockerfile::new();
        dockerfile.install("curl");

        let lines = sequence(&dockerfile);
        let notes = comments(&lines);
        assert_eq!(
            notes,
            vec![
                "Updating Package List".to_string(),
                "Installing packages".to_string(),
                "Cleaning up after installation".to_string(),
            ]
        );
        assert!(commands(&lines)
            .iter()
            .any(|c| c.contains("install -y --no-install-recommends curl && \\")));
    }

    #[test]
    fn test_requirements_installed_before_pre_install() {
        let mut dockerfile = Dockerfile::new();
        dockerfile.add_ppa("emacs", "ppa:kelleyk/emacs");

        let lines = sequence(&dockerfile);
        let notes = comments(&lines);
        let update = notes.iter().position(|c| c == "Updating Package List");
        let ppa = notes.iter().position(|c| c == "Adding emacs PPA");
        assert!(update.unwrap() < ppa.unwrap());

        let cmds = commands(&lines);
        assert!(cmds
            .iter()
            .any(|c| c.contains("software-properties-common")));
    }

    // === Requirements Subtraction Tests ===

    #[test]
    fn test_requirement_promoted_out_of_packages() {
        let mut dockerfile = Dockerfile::new();
        dockerfile.install("gnupg");
        dockerfile.install("curl");
        dockerfile.add_repository("docker", "deb https://example/ stable main", Some("AABBCCDD"));

        let lines = sequence(&dockerfile);
        let cmds = commands(&lines);

        let requirement_block: Vec<&String> =
            cmds.iter().filter(|c| c.contains("gnupg")).collect();
        // gnupg appears in the requirements install block and in no other
        // install line.
        assert_eq!(
            requirement_block
                .iter()
                .filter(|c| c.contains("--no-install-recommends"))
                .count(),
            1
        );
        assert!(cmds
            .iter()
            .any(|c| c.contains("--no-install-recommends curl && \\")));
    }

    // === Install Block Shape Tests ===

    #[test]
    fn test_install_block_single_package() {
        let packages: BTreeSet<String> = ["curl".to_string()].into_iter().collect();
        let lines = install_block(&packages);

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            Line::command(format!("{}curl && \\", INSTALL))
        );
        assert_eq!(lines[2], Line::Break);
    }

    #[test]
    fn test_install_block_pads_continuation_lines() {
        let packages: BTreeSet<String> =
            ["curl".to_string(), "wget".to_string()].into_iter().collect();
        let lines = install_block(&packages);
        let cmds = commands(&lines);

        assert_eq!(cmds[0], format!("{}curl \\", INSTALL));
        assert_eq!(cmds[1], format!("{}wget && \\", " ".repeat(INSTALL.len())));
        // Package names start in the same column on every line.
        assert_eq!(cmds[0].find("curl"), cmds[1].find("wget"));
    }

    #[test]
    fn test_install_block_sorted_lexicographically() {
        let packages: BTreeSet<String> = ["zsh", "bash", "curl"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cmds = commands(&install_block(&packages));
        let order: Vec<usize> = ["bash", "curl", "zsh"]
            .iter()
            .enumerate()
            .map(|(i, p)| {
                assert!(cmds[i].contains(p), "expected {} on line {}", p, i);
                i
            })
            .collect();
        assert_eq!(order.len(), 3);
    }

    // === Purge Phase Tests ===

    #[test]
    fn test_depends_purged_after_run_commands() {
        let mut dockerfile = Dockerfile::new();
        dockerfile.depend("build-essential");
        dockerfile.run("make");

        let lines = sequence(&dockerfile);
        let cmds = commands(&lines);

        let make = cmds.iter().position(|c| c == "make").unwrap();
        let purge = cmds
            .iter()
            .position(|c| c.contains("purge -y --auto-remove build-essential"))
            .unwrap();
        assert!(purge > make, "purge must come after every run command");
        assert!(cmds
            .iter()
            .any(|c| c.contains("--no-install-recommends build-essential && \\")));
    }

    #[test]
    fn test_purge_lists_sorted_depends() {
        let mut dockerfile = Dockerfile::new();
        dockerfile.depend("gcc");
        dockerfile.depend("automake");
        dockerfile.run("make");

        let cmds = commands(&sequence(&dockerfile));
        assert!(cmds
            .iter()
            .any(|c| c.contains("purge -y --auto-remove automake gcc")));
    }

    // === Deb Flag Tests ===

    #[test]
    fn test_deb_flag_adds_dependency_resolution_and_cleanup() {
        let mut dockerfile = Dockerfile::new();
        dockerfile.install_deb("app_1.0_amd64.deb");

        let lines = sequence(&dockerfile);
        let notes = comments(&lines);
        assert!(notes.contains(&"Installing deb package dependencies".to_string()));
        assert!(notes.contains(&"Removing temporary files".to_string()));

        let cmds = commands(&lines);
        let dpkg = cmds.iter().position(|c| c.contains("dpkg -i")).unwrap();
        let resolve = cmds
            .iter()
            .position(|c| c.contains("-y -f install"))
            .unwrap();
        let cleanup = cmds.iter().position(|c| c.contains("rm -f app_1.0_amd64.deb")).unwrap();
        assert!(dpkg < resolve);
        assert!(resolve < cleanup);
    }
}
