//! logical resource identifiers

/// Turns a declared resource name into a CloudFormation logical id
///
/// Only ASCII letters and digits are kept, the first character of every run of them is
/// upper-cased: `my-role_1` becomes `MyRole1`. Normalizing a normalized name does not change
/// it.
pub fn normalize(name: &str) -> String {
    let mut identifier = String::with_capacity(name.len());
    let mut upper = true;

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() {
            upper = true;
            continue;
        }

        if upper {
            identifier.push(c.to_ascii_uppercase());
        } else {
            identifier.push(c);
        }
        upper = false;
    }

    identifier
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalized_names() {
        for (input, expected) in [
            ("foo", "Foo"),
            ("my-role", "MyRole"),
            ("my_role_2", "MyRole2"),
            ("my-role_1", "MyRole1"),
            ("already", "Already"),
            ("AlreadyNormal", "AlreadyNormal"),
            ("lambda function", "LambdaFunction"),
            ("a..b--c", "ABC"),
            ("123abc", "123abc"),
            ("ünïcode", "NCode"),
            ("---", ""),
        ] {
            assert_eq!(normalize(input), expected, "{input}");
        }
    }

    #[test]
    fn idempotent() {
        for input in ["my-role", "my_role_2", "x.y.z", "MyRole", "a1-b2"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "{input}");
        }
    }
}
