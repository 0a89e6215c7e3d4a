//! Parser for `aapt dump xmltree <apk> AndroidManifest.xml` output.
//!
//! Both the `aapt` and `aapt2` renderings are understood: elements are
//! `E: name (line=N)`, attributes are `A: [ns:]name(0xID)=value`, and nesting
//! is expressed only by indentation.

use apkjoin_schema::{Component, ComponentKind, ManifestDescriptor, PackageName, VersionCode};

#[derive(Debug, Clone, Copy)]
enum Slot {
    Manifest,
    UsesSdk,
    Application,
    Permission,
    Feature,
    Component(usize),
    Other,
}

/// Decode the textual tree into a [`ManifestDescriptor`].
///
/// Never fails: whatever could be recognised is returned, the rest is left
/// at its default.
pub fn parse_manifest_tree(text: &str) -> ManifestDescriptor {
    let mut descriptor = ManifestDescriptor::default();
    let mut stack: Vec<(usize, Slot)> = Vec::new();

    for line in text.lines() {
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim_start();

        if let Some(rest) = trimmed.strip_prefix("E: ") {
            while stack.last().is_some_and(|(i, _)| *i >= indent) {
                stack.pop();
            }
            let name = rest.split_whitespace().next().unwrap_or_default();
            let slot = match name {
                "manifest" => Slot::Manifest,
                "uses-sdk" => Slot::UsesSdk,
                "application" => Slot::Application,
                "uses-permission" | "uses-permission-sdk-23" => Slot::Permission,
                "uses-feature" => Slot::Feature,
                other => match ComponentKind::from_element(other) {
                    Some(kind) => {
                        descriptor.components.push(Component {
                            kind,
                            name: String::new(),
                            exported: None,
                        });
                        Slot::Component(descriptor.components.len() - 1)
                    }
                    None => Slot::Other,
                },
            };
            stack.push((indent, slot));
            continue;
        }

        let Some(rest) = trimmed.strip_prefix("A: ") else {
            continue;
        };
        let Some((name, value)) = split_attribute(rest) else {
            continue;
        };
        let Some(&(_, slot)) = stack.last() else {
            continue;
        };

        match (slot, name) {
            (Slot::Manifest, "package") => descriptor.package = PackageName::new(&value),
            (Slot::Manifest, "versionCode") => {
                descriptor.version_code = VersionCode::parse_lenient(&value);
            }
            (Slot::Manifest, "versionName") => descriptor.version_name = Some(value),
            (Slot::UsesSdk, "minSdkVersion") => descriptor.min_sdk = Some(value),
            (Slot::UsesSdk, "targetSdkVersion") => descriptor.target_sdk = Some(value),
            (Slot::Application, attr) => {
                descriptor.application.insert(attr.to_string(), value);
            }
            (Slot::Permission, "name") => descriptor.permissions.push(value),
            (Slot::Feature, "name") => descriptor.features.push(value),
            (Slot::Component(idx), "name") => descriptor.components[idx].name = value,
            (Slot::Component(idx), "exported") => {
                descriptor.components[idx].exported = Some(value == "true");
            }
            _ => {}
        }
    }

    descriptor
}

/// Split `android:name(0x01010003)="x" (Raw: "x")` into `("name", "x")`.
fn split_attribute(rest: &str) -> Option<(&str, String)> {
    let eq = rest.find('=')?;
    let qualified = &rest[..eq];
    let qualified = qualified.split('(').next().unwrap_or(qualified);
    let name = qualified.rsplit(':').next().unwrap_or(qualified).trim();
    Some((name, decode_value(&rest[eq + 1..])))
}

fn decode_value(raw: &str) -> String {
    let raw = raw.trim();

    if let Some(quoted) = raw.strip_prefix('"') {
        return quoted.split('"').next().unwrap_or_default().to_string();
    }

    // `(type 0x10)0x2a`: 0x10 is a decimal int, 0x11 hex int, 0x12 boolean.
    if let Some(typed) = raw.strip_prefix("(type ") {
        if let Some((ty, value)) = typed.split_once(')') {
            let number = value
                .strip_prefix("0x")
                .and_then(|h| u64::from_str_radix(h, 16).ok());
            return match (ty, number) {
                ("0x12", Some(n)) => (n != 0).to_string(),
                ("0x10", Some(n)) => n.to_string(),
                _ => value.to_string(),
            };
        }
    }

    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAPT_TREE: &str = r#"N: android=http://schemas.android.com/apk/res/android
  E: manifest (line=2)
    A: android:versionCode(0x0101021b)=(type 0x10)0x2a
    A: android:versionName(0x0101021c)="1.4.2" (Raw: "1.4.2")
    A: package="com.example.game" (Raw: "com.example.game")
    E: uses-sdk (line=7)
      A: android:minSdkVersion(0x0101020c)=(type 0x10)0x15
      A: android:targetSdkVersion(0x01010270)=(type 0x10)0x21
    E: uses-permission (line=11)
      A: android:name(0x01010003)="android.permission.INTERNET" (Raw: "android.permission.INTERNET")
    E: uses-feature (line=12)
      A: android:name(0x01010003)="android.hardware.touchscreen" (Raw: "android.hardware.touchscreen")
    E: application (line=15)
      A: android:label(0x01010001)=@0x7f0b001b
      A: android:debuggable(0x0101000f)=(type 0x12)0xffffffff
      A: android:extractNativeLibs(0x010104ea)=(type 0x12)0x0
      E: activity (line=20)
        A: android:name(0x01010003)="com.example.game.MainActivity" (Raw: "com.example.game.MainActivity")
        A: android:exported(0x01010010)=(type 0x12)0xffffffff
        E: intent-filter (line=23)
          E: action (line=24)
            A: android:name(0x01010003)="android.intent.action.MAIN" (Raw: "android.intent.action.MAIN")
      E: service (line=30)
        A: android:name(0x01010003)="com.example.game.SyncService" (Raw: "com.example.game.SyncService")
      E: provider (line=34)
        A: android:name(0x01010003)="androidx.startup.InitializationProvider" (Raw: "androidx.startup.InitializationProvider")
        A: android:exported(0x01010010)=(type 0x12)0x0
"#;

    #[test]
    fn test_parse_aapt_tree() {
        let d = parse_manifest_tree(AAPT_TREE);
        assert_eq!(d.package, "com.example.game");
        assert_eq!(d.version_code, VersionCode::new(42));
        assert_eq!(d.version_name.as_deref(), Some("1.4.2"));
        assert_eq!(d.min_sdk.as_deref(), Some("21"));
        assert_eq!(d.target_sdk.as_deref(), Some("33"));
        assert_eq!(d.permissions, vec!["android.permission.INTERNET"]);
        assert_eq!(d.features, vec!["android.hardware.touchscreen"]);
        assert_eq!(d.application.get("debuggable").map(String::as_str), Some("true"));
        assert_eq!(
            d.application.get("extractNativeLibs").map(String::as_str),
            Some("false")
        );
        assert_eq!(d.application.get("label").map(String::as_str), Some("@0x7f0b001b"));

        assert_eq!(d.components.len(), 3);
        assert_eq!(d.components[0].kind, ComponentKind::Activity);
        assert_eq!(d.components[0].name, "com.example.game.MainActivity");
        assert_eq!(d.components[0].exported, Some(true));
        assert_eq!(d.components[1].exported, None);
        assert_eq!(d.components[2].exported, Some(false));
        assert_eq!(d.count(ComponentKind::Service), 1);
    }

    #[test]
    fn test_parse_aapt2_tree() {
        let text = r#"N: android=http://schemas.android.com/apk/res/android (line=2)
  E: manifest (line=2)
    A: http://schemas.android.com/apk/res/android:versionCode(0x0101021b)=43
    A: package="com.example.game" (Raw: "com.example.game")
    E: application (line=9)
      A: http://schemas.android.com/apk/res/android:hasCode(0x0101000c)=false
"#;
        let d = parse_manifest_tree(text);
        assert_eq!(d.version_code, VersionCode::new(43));
        assert_eq!(d.package, "com.example.game");
        assert!(d.has_no_code());
    }

    #[test]
    fn test_garbage_yields_default() {
        let d = parse_manifest_tree("ERROR: no such entry\n");
        assert!(d.package.is_empty());
        assert!(d.components.is_empty());
    }
}
