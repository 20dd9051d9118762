/// Splits text into pages of at most `page_length` characters, breaking
/// on line boundaries where possible. An oversized single line is hard
/// split on a char boundary.
pub fn pagify(text: &str, page_length: usize) -> Vec<String> {
    let mut pages = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if !current.is_empty() && current.len() + line.len() > page_length {
            pages.push(std::mem::take(&mut current));
        }

        if line.len() > page_length {
            let mut rest = line;

            while rest.len() > page_length {
                let mut split_at = page_length;
                while !rest.is_char_boundary(split_at) {
                    split_at -= 1;
                }

                let (head, tail) = rest.split_at(split_at);
                pages.push(head.to_string());
                rest = tail;
            }

            current.push_str(rest);
        } else {
            current.push_str(line);
        }
    }

    if !current.is_empty() {
        pages.push(current);
    }

    pages
}
