fn main() {
    emotion_sense_lib::run()
}
