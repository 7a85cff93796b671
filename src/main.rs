mod entry;

use tickhttp::error::AppResult;

fn main() -> AppResult<()> {
    entry::run()
}
